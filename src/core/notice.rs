//! Moderation notices sent to establishment owners.
//!
//! A [`Notice`] is composed against the record as it looked inside the
//! transaction, because the record may no longer exist once the action has
//! committed. Every piece of owner-supplied text is HTML-escaped.

use crate::adapters::OutboundMessage;
use crate::entities::establishment;

const DEFAULT_GUIDANCE: &str = "Please review the information you submitted and \
     make sure it is complete and accurate. If you have any questions, reply \
     to this message and our team will get back to you.";

/// The outcome an owner is told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    ListingApproved { edited: bool },
    UpdateApproved { edited: bool },
    DeletionApproved,
    ListingRejected { reason: Option<String> },
    UpdateRejected { reason: Option<String> },
    DeletionRejected { reason: Option<String> },
}

/// Escapes the characters that are significant in HTML text and attributes.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

impl Notice {
    fn subject(&self, team: &str) -> String {
        let what = match self {
            Self::ListingApproved { .. } => "Your listing has been approved",
            Self::UpdateApproved { .. } => "Your update request has been approved",
            Self::DeletionApproved => "Your listing has been removed",
            Self::ListingRejected { .. } => "Your listing was not approved",
            Self::UpdateRejected { .. } => "Your update request was not approved",
            Self::DeletionRejected { .. } => "Your deletion request was not approved",
        };
        format!("{what} - {team}")
    }

    fn body(&self, trade_name: &str) -> String {
        let name = format!("<strong>{trade_name}</strong>");
        let edited_note = "<p>An administrator adjusted some of the submitted \
                           information before publishing it.</p>";
        match self {
            Self::ListingApproved { edited } => format!(
                "<p>Good news: {name} is now published in the directory.</p>{}",
                if *edited { edited_note } else { "" }
            ),
            Self::UpdateApproved { edited } => format!(
                "<p>The changes you requested for {name} are now live.</p>{}",
                if *edited { edited_note } else { "" }
            ),
            Self::DeletionApproved => format!(
                "<p>As requested, {name} and all of its files have been removed from the directory.</p>"
            ),
            Self::ListingRejected { reason } => format!(
                "<p>We could not approve the registration of {name}.</p>{}",
                reason_block(reason.as_deref())
            ),
            Self::UpdateRejected { reason } => format!(
                "<p>Your request to update {name} was not approved. \
                 The previously published information was kept.</p>{}",
                reason_block(reason.as_deref())
            ),
            Self::DeletionRejected { reason } => format!(
                "<p>Your request to remove {name} was not approved. \
                 Your listing remains active.</p>{}",
                reason_block(reason.as_deref())
            ),
        }
    }

    /// Renders the notice for `record`. Returns `None` when the record has no
    /// contact address.
    #[must_use]
    pub fn compose(&self, record: &establishment::Model, team: &str) -> Option<OutboundMessage> {
        let to = record
            .contact_email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())?;

        let greeting = record
            .responsible_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(record.trade_name.as_str());

        let html = format!(
            "<h1>Hello, {}.</h1>{}<br><p>Kind regards,</p><p><strong>{}</strong></p>",
            escape_html(greeting),
            self.body(&escape_html(&record.trade_name)),
            escape_html(team),
        );

        Some(OutboundMessage {
            to: to.to_string(),
            subject: self.subject(team),
            html,
        })
    }
}

fn reason_block(reason: Option<&str>) -> String {
    match reason.map(str::trim).filter(|r| !r.is_empty()) {
        Some(reason) => format!("<p><strong>Reason:</strong> {}</p>", escape_html(reason)),
        None => format!("<p>{DEFAULT_GUIDANCE}</p>"),
    }
}
