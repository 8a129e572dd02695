//! Rate limiting logic: tiers, windows, counter keys and the limiter itself.

mod backend;
mod clock;
mod counter;
mod descriptor;
mod limiter;
mod rules;

pub use backend::AdmissionControl;
pub use clock::{Clock, ManualClock, SystemClock, WindowInstant};
pub use counter::{Tier, TimeWindow};
pub use descriptor::CounterKey;
pub use limiter::{Outcome, RateLimiter};
pub use rules::{QuotaTable, QuotaThresholds};
