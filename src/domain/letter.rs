use serde::Serialize;

use super::sanitize::{FieldLimit, sanitize_field};

/// Everything needed to typeset one letter.
///
/// Built fresh for every request, sanitised once, rendered once and dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LetterContent {
    pub subject: String,
    pub recipient: String,
    pub recipient_street: String,
    pub recipient_postal_code: String,
    pub recipient_city: String,
    pub sender: String,
    pub sender_street: String,
    pub sender_postal_code: String,
    pub sender_city: String,
    /// Already formatted for display, e.g. `1. Jänner 2024`.
    pub date: String,
    pub opening: String,
    pub closing: String,
    pub content: String,
    /// Reserve extra room above the sender name for a handwritten signature.
    pub signature_space: bool,
}

impl LetterContent {
    /// Make every text field safe for template substitution, in place.
    pub fn sanitize(&mut self) {
        for (field, limit) in self.text_fields_mut() {
            *field = sanitize_field(field.as_str(), limit);
        }
    }

    fn text_fields_mut(&mut self) -> [(&mut String, FieldLimit); 13] {
        [
            (&mut self.subject, FieldLimit::Line),
            (&mut self.recipient, FieldLimit::Line),
            (&mut self.recipient_street, FieldLimit::Line),
            (&mut self.recipient_postal_code, FieldLimit::Line),
            (&mut self.recipient_city, FieldLimit::Line),
            (&mut self.sender, FieldLimit::Line),
            (&mut self.sender_street, FieldLimit::Line),
            (&mut self.sender_postal_code, FieldLimit::Line),
            (&mut self.sender_city, FieldLimit::Line),
            (&mut self.date, FieldLimit::Line),
            (&mut self.opening, FieldLimit::Line),
            (&mut self.closing, FieldLimit::Line),
            (&mut self.content, FieldLimit::Body),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sanitize::{FORBIDDEN_CHARS, TRUNCATION_MARKER};

    fn hostile_letter() -> LetterContent {
        LetterContent {
            subject: "Rechnung {42}".into(),
            recipient: "\\input{/etc/passwd}".into(),
            recipient_street: "Hauptstraße 1 & 2".into(),
            recipient_postal_code: "1010%".into(),
            recipient_city: "Wien_Innere_Stadt".into(),
            sender: "<Max>".into(),
            sender_street: "Ring 3".into(),
            sender_postal_code: "8010".into(),
            sender_city: "Graz".into(),
            date: "1. Jänner 2024".into(),
            opening: "Sehr geehrte Damen und Herren,".into(),
            closing: "Mit freundlichen Grüßen".into(),
            content: "x".repeat(12_000),
            signature_space: true,
        }
    }

    #[test]
    fn sanitize_touches_every_text_field() {
        let mut letter = hostile_letter();
        letter.sanitize();

        let fields = [
            &letter.subject,
            &letter.recipient,
            &letter.recipient_street,
            &letter.recipient_postal_code,
            &letter.recipient_city,
            &letter.sender,
            &letter.sender_street,
            &letter.sender_postal_code,
            &letter.sender_city,
            &letter.date,
            &letter.opening,
            &letter.closing,
            &letter.content,
        ];
        for field in fields {
            assert!(!field.chars().any(|ch| FORBIDDEN_CHARS.contains(&ch)));
        }

        assert_eq!(letter.subject, "Rechnung  42 ");
        assert_eq!(letter.recipient_city, "Wien Innere Stadt");
        assert_eq!(letter.content.chars().count(), 10_000);
        assert!(letter.content.ends_with(TRUNCATION_MARKER));
        assert!(letter.signature_space);
    }

    #[test]
    fn sanitize_twice_equals_once() {
        let mut once = hostile_letter();
        once.sanitize();
        let mut twice = once.clone();
        twice.sanitize();
        assert_eq!(once, twice);
    }
}
