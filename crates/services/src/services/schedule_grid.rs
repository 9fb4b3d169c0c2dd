//! Schedule grid layout: turns a flat, ordered list of slots into a 2-D grid
//! of rows (start times) and columns (rooms), merging multi-room slots of the
//! same event into one spanning cell.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use db::models::slot::{RoomRef, ScheduledEvent, ScheduledSlot};
use serde::Serialize;
use ts_rs::TS;
use uuid::Uuid;

/// A renderable schedule. Row and column coordinates are 1-based and
/// end-exclusive, matching CSS grid areas.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct ScheduleGrid {
    pub columns: Vec<ScheduleColumn>,
    pub rows: Vec<ScheduleRow>,
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct ScheduleColumn {
    pub offset: usize,
    pub room: RoomRef,
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct ScheduleRow {
    pub offset: usize,
    pub time: DateTime<Utc>,
    pub items: Vec<ScheduleItem>,
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct ScheduleItem {
    pub row_start: usize,
    pub row_end: usize,
    pub column_start: usize,
    pub column_end: usize,
    pub slot: ScheduledSlot,
    pub is_streamed: bool,
}

impl ScheduleGrid {
    /// Build a grid from slots. The slots MUST be sorted by
    /// `(start, room order)`; this is not checked.
    pub fn from_slots(slots: &[ScheduledSlot]) -> ScheduleGrid {
        // Unique rooms, left to right by room order.
        let mut rooms: Vec<RoomRef> = Vec::new();
        for slot in slots {
            if !rooms.iter().any(|room| room.id == slot.room.id) {
                rooms.push(slot.room.clone());
            }
        }
        rooms.sort_by_key(|room| room.order);

        let room_offsets: HashMap<Uuid, usize> = rooms
            .iter()
            .enumerate()
            .map(|(index, room)| (room.id, index + 1))
            .collect();

        let columns = rooms
            .iter()
            .map(|room| ScheduleColumn {
                offset: room_offsets[&room.id],
                room: room.clone(),
            })
            .collect();

        // One row per distinct start time, in input (chronological) order.
        let mut rows: Vec<ScheduleRow> = Vec::new();
        let mut row_index: HashMap<DateTime<Utc>, usize> = HashMap::new();
        for slot in slots {
            if row_index.contains_key(&slot.start) {
                continue;
            }
            row_index.insert(slot.start, rows.len());
            rows.push(ScheduleRow {
                offset: rows.len() + 1,
                time: slot.start,
                items: Vec::new(),
            });
        }

        let last_row_time = rows.iter().map(|row| row.time).max();

        // Populate the rows with items.
        let mut last_item: Option<(usize, usize)> = None;
        for slot in slots {
            // The same event in a different room extends the previous item
            // to span this room's column instead of creating a new cell.
            if let Some((row, item)) = last_item {
                let prior = &mut rows[row].items[item];
                if is_same_for_different_room(&prior.slot, slot) {
                    prior.column_end = room_offsets[&slot.room.id] + 1;
                    if matches!(prior.slot.event, ScheduledEvent::Talk { .. }) {
                        prior.is_streamed = true;
                    }
                    continue;
                }
            }

            let row = row_index[&slot.start];
            let row_start = rows[row].offset;

            let row_end = match last_row_time {
                Some(last_time) if slot.end > last_time => {
                    // Ends after the last known start time: span through the
                    // final row.
                    row_index[&last_time] + 2
                }
                _ => match row_index.get(&slot.end) {
                    Some(end_row) => rows[*end_row].offset,
                    None => row_start + 1,
                },
            };

            let column_start = room_offsets[&slot.room.id];
            let is_streamed = matches!(
                slot.event,
                ScheduledEvent::Utility {
                    is_streamed: true,
                    ..
                }
            );

            rows[row].items.push(ScheduleItem {
                row_start,
                row_end,
                column_start,
                column_end: column_start + 1,
                slot: slot.clone(),
                is_streamed,
            });
            last_item = Some((row, rows[row].items.len() - 1));
        }

        ScheduleGrid { columns, rows }
    }

    /// Remove a row and shift the grid coordinates of everything below it up
    /// by one. Used to trim leading filler rows.
    pub fn pop_row(&mut self, index: usize) -> ScheduleRow {
        let removed = self.rows.remove(index);
        for row in &mut self.rows[index..] {
            row.offset -= 1;
            for item in &mut row.items {
                item.row_start -= 1;
                item.row_end -= 1;
            }
        }
        removed
    }

    /// Room labels covered by an item's column span.
    pub fn room_labels(&self, item: &ScheduleItem) -> Vec<String> {
        self.columns[item.column_start - 1..item.column_end - 1]
            .iter()
            .map(|column| column.room.label.clone())
            .collect()
    }
}

fn is_same_for_different_room(prior: &ScheduledSlot, slot: &ScheduledSlot) -> bool {
    prior.start == slot.start
        && prior.end == slot.end
        && prior.event.identity() == slot.event.identity()
        && prior.room.id != slot.room.id
}

impl ScheduleColumn {
    pub fn grid_area(&self) -> String {
        format!("1 / {} / 2 / {}", self.offset, self.offset + 1)
    }
}

impl ScheduleRow {
    pub fn contains_only_non_streamed_utilities(&self) -> bool {
        self.items
            .iter()
            .all(|item| item.is_utility() && !item.is_streamed)
    }
}

impl ScheduleItem {
    pub fn is_talk(&self) -> bool {
        matches!(self.slot.event, ScheduledEvent::Talk { .. })
    }

    pub fn is_workshop(&self) -> bool {
        matches!(self.slot.event, ScheduledEvent::Workshop { .. })
    }

    pub fn is_utility(&self) -> bool {
        matches!(self.slot.event, ScheduledEvent::Utility { .. })
    }

    pub fn is_multi_room(&self) -> bool {
        self.column_end - self.column_start > 1
    }

    pub fn grid_area(&self) -> String {
        format!(
            "{} / {} / {} / {}",
            self.row_start, self.column_start, self.row_end, self.column_end
        )
    }

    /// Rendering kind: keynotes stand out from regular talks.
    pub fn kind(&self) -> &str {
        match &self.slot.event {
            ScheduledEvent::Talk {
                is_keynote: true, ..
            } => "keynote",
            ScheduledEvent::Talk { session_type, .. } => session_type,
            ScheduledEvent::Workshop { session_type, .. } => session_type,
            ScheduledEvent::Utility { .. } => "utility",
        }
    }
}
