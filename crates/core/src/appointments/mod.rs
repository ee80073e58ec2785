pub mod hours;
pub mod lifecycle;

pub use hours::BusinessHours;
pub use lifecycle::{decide, AppointmentCommand, LifecycleContext, LifecycleDecision};
