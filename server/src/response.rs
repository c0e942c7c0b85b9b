use crate::utils::{timestamp_now, Clock};
use mcp_shared::{ChangeRecord, ProfileDocument, ProfileResponse, RESPONSE_VERSION};

/// Builds the command reply in two steps.
///
/// `begin` runs before the command and pins the base revision the client's
/// delta applies to. `finish` runs after the command (and any revision bump)
/// and takes the final revision numbers from the document.
#[derive(Debug, Clone)]
pub struct ResponseAssembler {
    response: ProfileResponse,
}

impl ResponseAssembler {
    pub fn begin(profile_id: &str, doc: &ProfileDocument, clock: &dyn Clock) -> Self {
        Self {
            response: ProfileResponse {
                profile_revision: doc.revision,
                profile_id: profile_id.to_string(),
                profile_changes_base_revision: doc.revision,
                profile_changes: Vec::new(),
                profile_command_revision: doc.command_revision,
                server_time: timestamp_now(clock),
                response_version: RESPONSE_VERSION,
            },
        }
    }

    pub fn base_revision(&self) -> i64 {
        self.response.profile_changes_base_revision
    }

    pub fn finish(mut self, doc: &ProfileDocument, changes: Vec<ChangeRecord>) -> ProfileResponse {
        self.response.profile_revision = doc.revision;
        self.response.profile_command_revision = doc.command_revision;
        self.response.profile_changes = changes;
        self.response
    }
}
