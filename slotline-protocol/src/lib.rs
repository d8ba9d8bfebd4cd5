pub mod backup;
pub mod benchmark;
pub mod checkpoint;
pub mod day;
pub mod record;
pub mod schedule;
pub mod settings;
pub mod snapshot;

pub mod prelude {
    pub use crate::backup::{BackupDocument, BACKUP_APP_TAG};
    pub use crate::benchmark::{Benchmark, Threshold, THRESHOLDS};
    pub use crate::checkpoint::Checkpoint;
    pub use crate::day::DayKey;
    pub use crate::record::{
        DailyRecord, DayState, HistoryMap, PendingReconciliation, RecordKind, DEFAULT_GOAL,
    };
    pub use crate::schedule::{PriorityTier, Schedule, ScheduleError, Slot, SLOT_COUNT};
    pub use crate::settings::{Settings, Theme, DEFAULT_ALARM_SLOTS};
    pub use crate::snapshot::SyncSnapshot;
}
