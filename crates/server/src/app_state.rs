use embed_core::RenderGate;
use server_api::ApiContext;

pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    pub(crate) gate: RenderGate,
}
