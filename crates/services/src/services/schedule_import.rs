//! Schedule import from a formatted spreadsheet. Rows are time slots,
//! columns are rooms, merged cells denote event duration and room span, and
//! day blocks are concatenated horizontally with the day name in the header.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use sqlx::SqlitePool;
use thiserror::Error;

use db::models::room::{CreateRoom, Room, RoomError};
use db::models::slot::{CreateSlot, Slot, SlotError, SlotEvent};
use db::models::talk::{Talk, TalkError};
use db::models::utility::{CreateUtility, Utility, UtilityError};
use db::models::workshop::{Workshop, WorkshopError};

use super::config::ConferenceDay;
use super::spreadsheet::{self, SheetMerge, SheetTable};

static ROOM_CAPACITY_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+\d+$").expect("invalid capacity regex"));
static PRETALX_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]{6}$").expect("invalid code regex"));

/// Minutes appended after the last parsed time to bound the final slot.
const TRAILING_BUCKET_MINUTES: i64 = 10;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read spreadsheet: {0}")]
    Spreadsheet(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Room(#[from] RoomError),
    #[error(transparent)]
    Utility(#[from] UtilityError),
    #[error(transparent)]
    Talk(#[from] TalkError),
    #[error(transparent)]
    Workshop(#[from] WorkshopError),
    #[error(transparent)]
    Slot(#[from] SlotError),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub rooms_created: usize,
    pub utilities_created: usize,
    pub slots_created: usize,
}

/// Read the first sheet of the given XLSX file and replace the stored
/// schedule with its contents. Missing rooms and utilities are created.
pub async fn import_xlsx(
    pool: &SqlitePool,
    days: &[ConferenceDay],
    offset: FixedOffset,
    path: &Path,
) -> Result<ImportSummary, ImportError> {
    let table = spreadsheet::load_xlsx(path)?;
    import_table(pool, days, offset, table).await
}

/// Import an already-loaded sheet table. Separated from `import_xlsx` so the
/// whole pipeline short of file parsing is testable in memory.
pub async fn import_table(
    pool: &SqlitePool,
    days: &[ConferenceDay],
    offset: FixedOffset,
    table: SheetTable,
) -> Result<ImportSummary, ImportError> {
    let cells = trim_trailing_dimensions(table.cells);

    // A re-import replaces the previous schedule wholesale.
    let removed = Slot::delete_all(pool).await?;
    if removed > 0 {
        tracing::info!("removed {} slots from the previous import", removed);
    }

    let mut batch = ImportBatch::new(pool).await?;
    for day in split_to_daily_tables(&cells, &table.merges, days, offset) {
        import_schedule_for_day(&mut batch, &day).await?;
    }

    // Slots reference rooms and utilities by id, so those were persisted as
    // they were first seen; the slots themselves go in one batch at the end.
    batch.bulk_create_slots().await
}

async fn import_schedule_for_day(
    batch: &mut ImportBatch<'_>,
    day: &ScheduleDay,
) -> Result<(), ImportError> {
    batch.create_missing_rooms(&day.room_names()).await?;

    for event in day.iterate_events() {
        let (Some(start), Some(end)) = (event.start, event.end) else {
            tracing::warn!(
                "skipping event {:?}: its time bucket could not be parsed",
                event.name
            );
            continue;
        };

        for room_name in &event.rooms {
            let Some(room_id) = batch.room_id(room_name) else {
                continue;
            };
            let slot_event = batch.resolve_event(&event.name).await?;
            batch.add_slot(CreateSlot {
                start,
                end,
                room_id,
                event: slot_event,
            });
        }
    }

    Ok(())
}

/// Accumulates objects over one import run. Talks, workshops, rooms and
/// utilities are looked up in a "new" map first, then the preloaded
/// "existing" map.
struct ImportBatch<'a> {
    pool: &'a SqlitePool,
    talks: HashMap<String, Talk>,
    workshops: HashMap<String, Workshop>,
    existing_rooms: HashMap<String, Room>,
    new_rooms: HashMap<String, Room>,
    existing_utilities: HashMap<String, Utility>,
    new_utilities: HashMap<String, Utility>,
    slots: Vec<CreateSlot>,
}

impl<'a> ImportBatch<'a> {
    async fn new(pool: &'a SqlitePool) -> Result<ImportBatch<'a>, ImportError> {
        let talks = Talk::find_synced(pool)
            .await?
            .into_iter()
            .filter_map(|talk| talk.pretalx_code.clone().map(|code| (code, talk)))
            .collect();
        let workshops = Workshop::find_synced(pool)
            .await?
            .into_iter()
            .filter_map(|ws| ws.pretalx_code.clone().map(|code| (code, ws)))
            .collect();
        let existing_rooms = Room::find_all(pool)
            .await?
            .into_iter()
            .map(|room| (room.label.clone(), room))
            .collect();
        let existing_utilities = Utility::find_all(pool)
            .await?
            .into_iter()
            .map(|utility| (utility.title.clone(), utility))
            .collect();

        Ok(ImportBatch {
            pool,
            talks,
            workshops,
            existing_rooms,
            new_rooms: HashMap::new(),
            existing_utilities,
            new_utilities: HashMap::new(),
            slots: Vec::new(),
        })
    }

    async fn create_missing_rooms(&mut self, room_names: &[String]) -> Result<(), ImportError> {
        for (position, room_name) in room_names.iter().enumerate() {
            if self.room_id(room_name).is_some() {
                continue;
            }
            let room = Room::create(
                self.pool,
                CreateRoom {
                    label: room_name.clone(),
                    slug: slug::slugify(room_name),
                    order: 10 * (position as i64 + 1),
                },
            )
            .await?;
            self.new_rooms.insert(room.label.clone(), room);
        }

        Ok(())
    }

    fn room_id(&self, label: &str) -> Option<uuid::Uuid> {
        self.new_rooms
            .get(label)
            .or_else(|| self.existing_rooms.get(label))
            .map(|room| room.id)
    }

    /// Resolve a cell's text to a slot event. A pretalx code is looked up
    /// among talks first, then workshops; anything else becomes a utility
    /// created (or reused) by exact title.
    async fn resolve_event(&mut self, name: &str) -> Result<SlotEvent, ImportError> {
        if is_pretalx_code(name) {
            if let Some(talk) = self.talks.get(name) {
                return Ok(SlotEvent::Talk(talk.id));
            }
            if let Some(workshop) = self.workshops.get(name) {
                return Ok(SlotEvent::Workshop(workshop.id));
            }
            // Possibly a typo in the sheet; fall through to a utility so the
            // import still completes, but leave a trace for the operator.
            tracing::warn!(
                "cell {:?} looks like a pretalx code but matches no talk or workshop",
                name
            );
        }

        let utility = self.get_or_create_utility(name).await?;
        Ok(SlotEvent::Utility(utility))
    }

    async fn get_or_create_utility(&mut self, title: &str) -> Result<uuid::Uuid, ImportError> {
        if let Some(utility) = self
            .new_utilities
            .get(title)
            .or_else(|| self.existing_utilities.get(title))
        {
            return Ok(utility.id);
        }

        let utility = Utility::create(
            self.pool,
            CreateUtility {
                title: title.to_string(),
                slug: slug::slugify(title),
                ..Default::default()
            },
        )
        .await?;
        let id = utility.id;
        self.new_utilities.insert(utility.title.clone(), utility);

        Ok(id)
    }

    fn add_slot(&mut self, slot: CreateSlot) {
        self.slots.push(slot);
    }

    async fn bulk_create_slots(self) -> Result<ImportSummary, ImportError> {
        let slots_created = Slot::create_many(self.pool, &self.slots).await?;

        Ok(ImportSummary {
            rooms_created: self.new_rooms.len(),
            utilities_created: self.new_utilities.len(),
            slots_created,
        })
    }
}

/// One day's sub-table: column 0 is the timeline, row 0 the room header.
struct ScheduleDay {
    values: Vec<Vec<Option<String>>>,
    merges: HashMap<(usize, usize), SheetMerge>,
    timeline: Vec<Option<DateTime<Utc>>>,
    header: Vec<Option<String>>,
}

/// An event cell expanded with its time range and the rooms it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScheduleEvent {
    name: String,
    rooms: Vec<String>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl ScheduleDay {
    fn new(
        date: NaiveDate,
        values: Vec<Vec<Option<String>>>,
        merges: Vec<SheetMerge>,
        offset: FixedOffset,
    ) -> ScheduleDay {
        let merges = merges
            .into_iter()
            .map(|merge| ((merge.start_row, merge.start_col), merge))
            .collect();
        let timeline = prepare_timeline(date, &values, offset);
        let header = prepare_header(&values);

        ScheduleDay {
            values,
            merges,
            timeline,
            header,
        }
    }

    /// Room names extracted from the table header, in column order.
    fn room_names(&self) -> Vec<String> {
        self.header.iter().flatten().cloned().collect()
    }

    /// Walk every non-empty body cell, resolving its span from the merge
    /// record anchored there (1 row by 1 column when there is none).
    fn iterate_events(&self) -> Vec<ScheduleEvent> {
        let mut events = Vec::new();
        for (row_index, row) in self.values.iter().enumerate().skip(1) {
            for (col_index, value) in row.iter().enumerate().skip(1) {
                let Some(name) = value else {
                    continue;
                };

                let merge = self
                    .merges
                    .get(&(row_index, col_index))
                    .copied()
                    .unwrap_or(SheetMerge {
                        start_row: row_index,
                        end_row: row_index + 1,
                        start_col: col_index,
                        end_col: col_index + 1,
                    });

                let start = self.timeline.get(row_index).copied().flatten();
                let end = self.timeline.get(merge.end_row).copied().flatten();
                let rooms = self
                    .header
                    .get(col_index..merge.end_col.min(self.header.len()))
                    .unwrap_or(&[])
                    .iter()
                    .flatten()
                    .cloned()
                    .collect();

                events.push(ScheduleEvent {
                    name: name.clone(),
                    rooms,
                    start,
                    end,
                });
            }
        }
        events
    }
}

/// Parse the timeline column into timestamps on the given date. Unparseable
/// cells become `None` rather than failing the import; one extra bucket is
/// appended after the last parsed time to bound the final slot's duration.
fn prepare_timeline(
    date: NaiveDate,
    values: &[Vec<Option<String>>],
    offset: FixedOffset,
) -> Vec<Option<DateTime<Utc>>> {
    let mut timeline: Vec<Option<DateTime<Utc>>> = values
        .iter()
        .map(|row| {
            row.first()
                .and_then(|cell| cell.as_deref())
                .and_then(|text| NaiveTime::parse_from_str(text, "%H:%M").ok())
                .and_then(|time| date.and_time(time).and_local_timezone(offset).single())
                .map(|stamp| stamp.with_timezone(&Utc))
        })
        .collect();

    if let Some(last) = timeline.iter().flatten().max().copied() {
        timeline.push(Some(last + Duration::minutes(TRAILING_BUCKET_MINUTES)));
    }

    timeline
}

/// Room names from the header row. The first cell holds the day title and is
/// kept as `None`; capacity suffixes ("Main Hall 144") are stripped.
fn prepare_header(values: &[Vec<Option<String>>]) -> Vec<Option<String>> {
    let Some(header_row) = values.first() else {
        return Vec::new();
    };

    let mut header = vec![None];
    header.extend(header_row.iter().skip(1).map(|cell| {
        cell.as_deref()
            .map(|name| ROOM_CAPACITY_SUFFIX.replace(name.trim(), "").into_owned())
    }));
    header
}

/// Split the full table into one sub-table per conference day, using day
/// titles in the header row as boundaries. Header cells that match no
/// configured day are ordinary data.
fn split_to_daily_tables(
    values: &[Vec<Option<String>>],
    merges: &[SheetMerge],
    days: &[ConferenceDay],
    offset: FixedOffset,
) -> Vec<ScheduleDay> {
    let Some(header_row) = values.first() else {
        return Vec::new();
    };

    let mut result = Vec::new();
    let mut index = 0;
    while index < header_row.len() {
        let Some(date) = header_row[index]
            .as_deref()
            .and_then(|cell| parse_conference_day_title(cell, days))
        else {
            index += 1;
            continue;
        };

        // The day's columns run until the next day title or the table end.
        let start_index = index;
        index += 1;
        while index < header_row.len() {
            let next_day = header_row[index]
                .as_deref()
                .and_then(|cell| parse_conference_day_title(cell, days));
            if next_day.is_some() {
                break;
            }
            index += 1;
        }

        result.push(ScheduleDay::new(
            date,
            slice_columns(values, start_index, index),
            slice_merges(merges, start_index, index),
            offset,
        ));
    }

    result
}

/// Match the given header cell against the configured conference days.
fn parse_conference_day_title(value: &str, days: &[ConferenceDay]) -> Option<NaiveDate> {
    let value_lower = value.to_lowercase();
    days.iter()
        .find(|day| value_lower.starts_with(&day.name.to_lowercase()))
        .map(|day| day.date)
}

/// Removes empty rows and columns from the end of the table. Spreadsheet
/// exports routinely pad the used area with trailing blanks.
fn trim_trailing_dimensions(mut values: Vec<Vec<Option<String>>>) -> Vec<Vec<Option<String>>> {
    while let Some(last_row) = values.last() {
        if last_row.iter().any(|cell| cell.is_some()) {
            break;
        }
        values.pop();
    }

    let last_non_empty_column = values
        .iter()
        .map(|row| {
            row.iter()
                .rposition(|cell| cell.is_some())
                .map_or(0, |index| index + 1)
        })
        .max()
        .unwrap_or(0);

    for row in &mut values {
        row.truncate(last_non_empty_column);
    }

    values
}

/// Slice the given column range out of every row. The table ends at the
/// first row whose timeline column is empty.
fn slice_columns(
    values: &[Vec<Option<String>>],
    start: usize,
    stop: usize,
) -> Vec<Vec<Option<String>>> {
    let mut result = Vec::new();
    for row in values {
        let row_slice: Vec<Option<String>> = row
            .get(start..stop.min(row.len()))
            .unwrap_or(&[])
            .to_vec();
        if row_slice.first().map_or(true, |cell| cell.is_none()) {
            break;
        }
        result.push(row_slice);
    }
    result
}

/// Keep merges anchored inside the column range and rebase their columns to
/// match the indices produced by `slice_columns`.
fn slice_merges(merges: &[SheetMerge], start: usize, stop: usize) -> Vec<SheetMerge> {
    merges
        .iter()
        .filter(|merge| merge.start_col >= start && merge.start_col < stop)
        .map(|merge| SheetMerge {
            start_row: merge.start_row,
            end_row: merge.end_row,
            start_col: merge.start_col - start,
            end_col: merge.end_col - start,
        })
        .collect()
}

/// Check if the given value matches the 6-alphanum shape of a pretalx
/// submission code.
fn is_pretalx_code(value: &str) -> bool {
    PRETALX_CODE.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::schedule_grid::ScheduleGrid;
    use crate::services::test_support::setup_test_pool;
    use chrono::TimeZone;
    use db::models::slot::{ScheduledEvent, ScheduledSlot};
    use db::models::talk::CreateTalk;

    fn cell(text: &str) -> Option<String> {
        Some(text.to_string())
    }

    fn cest() -> FixedOffset {
        "+02:00".parse().unwrap()
    }

    fn days() -> Vec<ConferenceDay> {
        vec![
            ConferenceDay {
                name: "friday".into(),
                date: NaiveDate::from_ymd_opt(2024, 9, 13).unwrap(),
            },
            ConferenceDay {
                name: "saturday".into(),
                date: NaiveDate::from_ymd_opt(2024, 9, 14).unwrap(),
            },
        ]
    }

    fn utc(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, day, hour, minute, 0).unwrap()
    }

    #[test]
    fn trims_trailing_rows_and_columns() {
        let values = vec![
            vec![cell("a"), cell("b"), None, None],
            vec![cell("c"), None, None, None],
            vec![None, None, None, None],
        ];

        let trimmed = trim_trailing_dimensions(values);
        assert_eq!(trimmed.len(), 2);
        assert_eq!(trimmed[0].len(), 2);
        assert_eq!(trimmed[1], vec![cell("c"), None]);
    }

    #[test]
    fn header_is_split_on_day_titles() {
        let values = vec![
            vec![cell("Friday Talks"), cell("Hall A"), cell("Saturday"), cell("Hall B")],
            vec![cell("10:00"), cell("X"), cell("09:00"), cell("Y")],
        ];

        let tables = split_to_daily_tables(&values, &[], &days(), cest());
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].room_names(), vec!["Hall A"]);
        assert_eq!(tables[1].room_names(), vec!["Hall B"]);
        // 10:00 CEST on Friday.
        assert_eq!(tables[0].timeline[1], Some(utc(13, 8, 0)));
        // 09:00 CEST on Saturday.
        assert_eq!(tables[1].timeline[1], Some(utc(14, 7, 0)));
    }

    #[test]
    fn unknown_day_title_is_ordinary_data() {
        let values = vec![
            vec![cell("Ball Room"), cell("Hall A")],
            vec![cell("10:00"), cell("X")],
        ];

        let tables = split_to_daily_tables(&values, &[], &days(), cest());
        assert!(tables.is_empty());
    }

    #[test]
    fn capacity_suffix_is_stripped_from_room_names() {
        let values = vec![
            vec![cell("Friday"), cell("Main Hall 144"), cell("Club 80")],
            vec![cell("10:00"), cell("X"), None],
        ];

        let tables = split_to_daily_tables(&values, &[], &days(), cest());
        assert_eq!(tables[0].room_names(), vec!["Main Hall", "Club"]);
    }

    #[test]
    fn malformed_time_cell_is_tolerated() {
        let values = vec![
            vec![cell("Friday"), cell("Hall A")],
            vec![cell("10:00"), cell("Opening")],
            vec![cell("later"), cell("Unclear")],
        ];

        let tables = split_to_daily_tables(&values, &[], &days(), cest());
        let day = &tables[0];
        assert_eq!(day.timeline[2], None);

        let events = day.iterate_events();
        assert_eq!(events.len(), 2);
        // The event in the malformed bucket has no start; the import skips
        // it instead of failing.
        assert_eq!(events[1].start, None);
    }

    #[test]
    fn merge_determines_duration_and_room_span() {
        let values = vec![
            vec![cell("Friday"), cell("Hall A"), cell("Hall B")],
            vec![cell("10:00"), cell("BREAK"), None],
            vec![cell("10:30"), cell("AB12CD"), cell("EF34GH")],
        ];
        // BREAK spans both rooms and one time bucket.
        let merges = vec![SheetMerge {
            start_row: 1,
            end_row: 2,
            start_col: 1,
            end_col: 3,
        }];

        let tables = split_to_daily_tables(&values, &merges, &days(), cest());
        let events = tables[0].iterate_events();
        assert_eq!(events.len(), 3);

        assert_eq!(events[0].name, "BREAK");
        assert_eq!(events[0].rooms, vec!["Hall A", "Hall B"]);
        assert_eq!(events[0].start, Some(utc(13, 8, 0)));
        assert_eq!(events[0].end, Some(utc(13, 8, 30)));

        // Unmerged cells span one row; the last time bucket is bounded by
        // the synthetic +10min entry.
        assert_eq!(events[1].name, "AB12CD");
        assert_eq!(events[1].rooms, vec!["Hall A"]);
        assert_eq!(events[1].end, Some(utc(13, 8, 40)));
    }

    #[tokio::test]
    async fn import_then_grid_build_merges_multi_room_utility() {
        let pool = setup_test_pool().await;

        let table = SheetTable {
            cells: vec![
                vec![cell("Friday"), cell("Main Hall 144"), cell("Club")],
                vec![cell("09:00"), cell("Registration"), None],
                vec![cell("10:00"), cell("AB12CD"), cell("Coffee")],
            ],
            merges: vec![SheetMerge {
                start_row: 1,
                end_row: 2,
                start_col: 1,
                end_col: 3,
            }],
        };

        let talk = Talk::create(
            &pool,
            CreateTalk {
                title: "Imported talk".into(),
                pretalx_code: Some("AB12CD".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let summary = import_table(&pool, &days(), cest(), table.clone())
            .await
            .unwrap();
        assert_eq!(summary.rooms_created, 2);
        assert_eq!(summary.utilities_created, 2);
        // Registration lands in both rooms; one slot each for the talk and
        // the coffee break.
        assert_eq!(summary.slots_created, 4);

        let slots = ScheduledSlot::find_all(&pool).await.unwrap();
        assert_eq!(slots.len(), 4);
        assert!(slots.iter().any(|slot| matches!(
            &slot.event,
            ScheduledEvent::Talk { id, .. } if *id == talk.id
        )));

        // The grid recombines the two registration slots into one item
        // spanning both room columns.
        let grid = ScheduleGrid::from_slots(&slots);
        assert_eq!(grid.columns.len(), 2);
        assert_eq!(grid.rows.len(), 2);
        assert_eq!(grid.rows[0].items.len(), 1);
        let registration = &grid.rows[0].items[0];
        assert_eq!(registration.column_start, 1);
        assert_eq!(registration.column_end, 3);
        assert!(registration.is_multi_room());

        // Re-import replaces the slot set without duplicating rooms or
        // utilities.
        let summary = import_table(&pool, &days(), cest(), table).await.unwrap();
        assert_eq!(summary.rooms_created, 0);
        assert_eq!(summary.utilities_created, 0);
        assert_eq!(summary.slots_created, 4);
        assert_eq!(ScheduledSlot::find_all(&pool).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn unmatched_code_falls_back_to_utility() {
        let pool = setup_test_pool().await;

        let table = SheetTable {
            cells: vec![
                vec![cell("Friday"), cell("Hall A")],
                vec![cell("10:00"), cell("ZZ99ZZ")],
            ],
            merges: vec![],
        };

        let summary = import_table(&pool, &days(), cest(), table).await.unwrap();
        assert_eq!(summary.utilities_created, 1);

        let utilities = Utility::find_all(&pool).await.unwrap();
        assert_eq!(utilities.len(), 1);
        assert_eq!(utilities[0].title, "ZZ99ZZ");
    }

    #[test]
    fn pretalx_code_shape() {
        assert!(is_pretalx_code("AB12CD"));
        assert!(is_pretalx_code("ABCDEF"));
        assert!(!is_pretalx_code("ab12cd"));
        assert!(!is_pretalx_code("AB12C"));
        assert!(!is_pretalx_code("Lunch break"));
    }
}
