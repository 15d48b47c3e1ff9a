mod snapshot;
mod task;

pub use snapshot::Snapshot;
pub use task::TaskRecord;
