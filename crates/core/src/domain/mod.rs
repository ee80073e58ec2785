pub mod appointment;
pub mod batch;
pub mod catalog;
pub mod conversation;
pub mod delivery;
pub mod intent;
pub mod lead;
pub mod notification;
pub mod outbound;
