pub mod departure_monitor;

pub use departure_monitor::DepartureMonitor;
