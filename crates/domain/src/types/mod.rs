//! Common data types used throughout the application

pub mod appointment;
pub mod policy;
pub mod quota;
pub mod reservation;
pub mod window;

pub use appointment::{
    Appointment, AppointmentChange, AppointmentStatus, ChannelStatus, NotificationPatch,
    NotificationState, ReminderKind, SemanticView,
};
pub use policy::BufferPolicy;
pub use quota::{PlanTier, ResourceKind};
pub use reservation::{HoldReceipt, HoldRequest, Reservation};
pub use window::TimeWindow;
