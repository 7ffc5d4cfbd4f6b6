use crate::proxy::job::Job;

/// Shared state for every HTTP handler. Cloning is cheap: it's just the
/// admission queue's sending half.
#[derive(Clone)]
pub struct AppState {
    pub jobs: async_channel::Sender<Job>,
}
