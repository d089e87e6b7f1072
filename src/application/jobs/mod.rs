mod batch;
mod clock;
mod ids;
mod lock;
mod queue;
mod retention;
mod table;
mod worker;

pub use batch::{BatchConverter, BatchOutcome, DEFAULT_WAIT_POLL_INTERVAL};
pub use clock::{Clock, ManualClock, SystemClock};
pub use ids::{IdGenerator, UuidV7Ids};
pub use queue::{
    ConversionQueue, DEFAULT_ADMISSION_TIMEOUT, DEFAULT_CAPACITY, DEFAULT_CLEANUP_INTERVAL,
    DEFAULT_RENDER_TIMEOUT, DEFAULT_RETENTION, DEFAULT_WORKERS, QueueBuilder, QueueConfig,
    QueueError, QueueStats,
};
pub use table::{JobTable, StatusCounts};
