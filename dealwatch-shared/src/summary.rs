/// Order summary generator
///
/// Renders a room's watch list as a plain-text order summary. The layout is
/// chosen per room kind through a formatting-strategy table: general
/// shopping rooms get a flat list with per-line totals, food rooms group
/// lines under the member they are assigned to. Output is deterministic for
/// unchanged state.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::CommandError;
use crate::models::{AlertStatus, PollState, Room, RoomKind, WatchedItem};
use crate::store::Store;

/// Optional summary filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryFilter {
    /// Every item in the room
    Everything,

    /// Only items added on the given UTC day
    Today(DateTime<Utc>),
}

/// One renderable summary line
struct SummaryLine {
    name: String,
    nickname: String,
    quantity: u32,
    line_total: f64,
    stale: bool,
    delivery_failed: bool,
}

type FormatFn = fn(&Room, &[SummaryLine]) -> String;

/// Formatting strategy per room kind
const FORMATTERS: &[(RoomKind, FormatFn)] = &[
    (RoomKind::GeneralShopping, format_flat),
    (RoomKind::Food, format_grouped),
];

/// Order summary generator service
pub struct SummaryGenerator {
    store: Arc<dyn Store>,
}

impl SummaryGenerator {
    /// Creates a generator over the given store
    pub fn new(store: Arc<dyn Store>) -> Self {
        SummaryGenerator { store }
    }

    /// Renders the summary for a room
    ///
    /// An empty room renders an explicit "nothing watched" text; it is
    /// never an error.
    pub async fn render(
        &self,
        room_id: Uuid,
        filter: SummaryFilter,
    ) -> Result<String, CommandError> {
        let room = self
            .store
            .find_room(room_id)
            .await?
            .ok_or_else(|| CommandError::RoomNotFound(room_id.to_string()))?;

        let mut items = self.store.items_for_room(room_id).await?;
        if let SummaryFilter::Today(now) = filter {
            items.retain(|i| i.created_at.date_naive() == now.date_naive());
        }

        if items.is_empty() {
            return Ok(format!(
                "No items in {} yet. Add one with ADD <link> | <nickname>.",
                room.name
            ));
        }

        let mut lines = Vec::with_capacity(items.len());
        for item in &items {
            lines.push(self.line_for(item).await?);
        }

        let format = FORMATTERS
            .iter()
            .find(|(kind, _)| *kind == room.kind)
            .map(|(_, f)| *f)
            .unwrap_or(format_flat);
        Ok(format(&room, &lines))
    }

    async fn line_for(&self, item: &WatchedItem) -> Result<SummaryLine, CommandError> {
        let name = match &item.assigned_to {
            Some(assigned) => assigned.clone(),
            None => match self.store.find_user(item.added_by).await? {
                Some(adder) => adder.label().to_string(),
                None => "Unassigned".to_string(),
            },
        };
        let delivery_failed = self
            .store
            .latest_alert_for_item(item.id)
            .await?
            .is_some_and(|a| a.status == AlertStatus::Failed);
        Ok(SummaryLine {
            name,
            nickname: item.nickname.clone(),
            quantity: item.quantity,
            line_total: item.line_total(),
            stale: item.poll_state == PollState::Stale,
            delivery_failed,
        })
    }
}

fn format_flat(room: &Room, lines: &[SummaryLine]) -> String {
    let mut out = format!("Order summary — {}\n", room.name);
    for line in lines {
        out.push_str(&render_line(line, ""));
    }
    out.push_str(&format!("Total: {}", money(total(lines))));
    out
}

fn format_grouped(room: &Room, lines: &[SummaryLine]) -> String {
    // Member-name order; creation order is preserved within each group.
    let mut names: Vec<&str> = Vec::new();
    for line in lines {
        if !names
            .iter()
            .any(|n| n.eq_ignore_ascii_case(&line.name))
        {
            names.push(&line.name);
        }
    }
    names.sort_by_key(|n| n.to_ascii_lowercase());

    let mut out = format!("Order summary — {}\n", room.name);
    for name in names {
        out.push_str(&format!("{name}:\n"));
        for line in lines.iter().filter(|l| l.name.eq_ignore_ascii_case(name)) {
            out.push_str(&render_grouped_line(line));
        }
    }
    out.push_str(&format!("Total: {}", money(total(lines))));
    out
}

fn render_line(line: &SummaryLine, indent: &str) -> String {
    format!(
        "{indent}{}: {} x{} ({}){}\n",
        line.name,
        line.nickname,
        line.quantity,
        money(line.line_total),
        markers(line)
    )
}

fn render_grouped_line(line: &SummaryLine) -> String {
    format!(
        "  - {} x{} ({}){}\n",
        line.nickname,
        line.quantity,
        money(line.line_total),
        markers(line)
    )
}

fn markers(line: &SummaryLine) -> &'static str {
    match (line.stale, line.delivery_failed) {
        (true, _) => " [price may be out of date]",
        (false, true) => " [alert undelivered]",
        (false, false) => "",
    }
}

fn total(lines: &[SummaryLine]) -> f64 {
    lines.iter().map(|l| l.line_total).sum()
}

/// Formats a money amount, dropping the cents when they are zero
pub(crate) fn money(amount: f64) -> String {
    let rounded = (amount * 100.0).round() / 100.0;
    if (rounded - rounded.trunc()).abs() < 1e-9 {
        format!("${}", rounded.trunc() as i64)
    } else {
        format!("${rounded:.2}")
    }
}
