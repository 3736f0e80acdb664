// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Business logic (like "send the OTP email") lives in domain handlers that use these traits.
//
// Naming convention: Base* for trait names (e.g., BaseMailer)

use anyhow::Result;
use async_trait::async_trait;

pub use mailer::Attachment;

// =============================================================================
// Mailer Trait (Infrastructure - outbound email)
// =============================================================================

#[async_trait]
pub trait BaseMailer: Send + Sync {
    /// Send an HTML email. `to` must not be empty.
    async fn send_email(
        &self,
        subject: &str,
        content: &str,
        to: &[String],
        cc: &[String],
        bcc: &[String],
        attachments: &[Attachment],
    ) -> Result<()>;
}
