pub mod poller;

pub use poller::PollerSubsystem;
