use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Serialize, Serializer};

/// A file attached to an outgoing email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    #[serde(serialize_with = "as_base64")]
    pub content: Vec<u8>,
}

fn as_base64<S: Serializer>(content: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(content))
}

/// An email ready to hand to the delivery API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub html: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Sender<'a> {
    pub name: &'a str,
    pub email: &'a str,
}

/// JSON body posted to the delivery API.
#[derive(Debug, Serialize)]
pub(crate) struct SendRequest<'a> {
    pub from: Sender<'a>,
    pub to: &'a [String],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub cc: &'a [String],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub bcc: &'a [String],
    pub subject: &'a str,
    pub html: &'a str,
    #[serde(skip_serializing_if = "<[Attachment]>::is_empty")]
    pub attachments: &'a [Attachment],
}
