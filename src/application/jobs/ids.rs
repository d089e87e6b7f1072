use uuid::Uuid;

/// Source of candidate job identifiers. The job table still checks each
/// candidate against resident jobs before accepting it.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Time-ordered UUID v7 identifiers rendered in simple (unhyphenated) form.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidV7Ids;

impl IdGenerator for UuidV7Ids {
    fn next_id(&self) -> String {
        Uuid::now_v7().simple().to_string()
    }
}
