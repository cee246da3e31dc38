use std::sync::Arc;

use admission::AdmissionEngine;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) engine: Arc<AdmissionEngine>,
}
