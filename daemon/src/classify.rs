/// Rule-based notification classifier.
///
/// Categories are decided by [`RULES`], an ordered list evaluated top to bottom
/// against the lower-cased package identifier and the lower-cased
/// `title + " " + content` text.  The first rule whose condition holds wins;
/// [`Category::Other`] is the fallback.
///
/// Order matters: banking apps and payment wording are checked before the OTP
/// rule, so a one-time code sent by a bank is reported as `Banking`.
use std::sync::OnceLock;

use regex::Regex;

use crate::model::{Category, ClassifiedEvent, NormalizedEvent};

/// Stock messaging apps that are always SMS regardless of other matches.
pub const DEFAULT_SMS_PACKAGES: &[&str] = &[
    "com.google.android.apps.messaging",
    "com.samsung.android.messaging",
];

const BANK_PACKAGE_HINTS: &[&str] = &[
    "paytm", "phonepe", "googlepay", "gpay", "bhim", "bank", "sbi", "hdfc", "icici", "axis",
];

/// Known package substrings and the friendly app name they map to.
/// Matched case-sensitively against the raw package identifier, in order.
pub const DISPLAY_NAMES: &[(&str, &str)] = &[
    ("messaging", "Messages"),
    ("whatsapp", "WhatsApp"),
    ("telegram", "Telegram"),
    ("gmail", "Gmail"),
    ("outlook", "Outlook"),
    ("paytm", "Paytm"),
    ("phonepe", "PhonePe"),
    ("gpay", "Google Pay"),
    ("sbi", "SBI"),
    ("hdfc", "HDFC Bank"),
    ("icici", "ICICI Bank"),
];

/// A predicate over a lower-cased package identifier and text.
#[derive(Debug, Clone, Copy)]
pub enum Condition {
    PackageContains(&'static [&'static str]),
    PackageEquals(&'static [&'static str]),
    TextContains(&'static [&'static str]),
    /// Text holds a standalone run of 4 to 6 digits.
    HasCodeDigits,
    Any(&'static [Condition]),
    All(&'static [Condition]),
}

impl Condition {
    fn holds(&self, subject: &Subject) -> bool {
        match self {
            Condition::PackageContains(needles) => {
                needles.iter().any(|n| subject.package.contains(n))
            }
            Condition::PackageEquals(ids) => ids.iter().any(|id| subject.package == *id),
            Condition::TextContains(needles) => needles.iter().any(|n| subject.text.contains(n)),
            Condition::HasCodeDigits => code_digits().is_match(&subject.text),
            Condition::Any(conditions) => conditions.iter().any(|c| c.holds(subject)),
            Condition::All(conditions) => conditions.iter().all(|c| c.holds(subject)),
        }
    }
}

/// One entry of the ordered rule list.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub category: Category,
    pub condition: Condition,
}

pub const RULES: &[Rule] = &[
    Rule {
        category: Category::Sms,
        condition: Condition::Any(&[
            Condition::PackageContains(&["messaging", "sms"]),
            Condition::PackageEquals(DEFAULT_SMS_PACKAGES),
        ]),
    },
    Rule {
        category: Category::WhatsApp,
        condition: Condition::PackageContains(&["whatsapp"]),
    },
    Rule {
        category: Category::Telegram,
        condition: Condition::PackageContains(&["telegram"]),
    },
    Rule {
        category: Category::Email,
        condition: Condition::PackageContains(&["gmail", "email", "outlook", "mail"]),
    },
    Rule {
        category: Category::Banking,
        condition: Condition::Any(&[
            Condition::PackageContains(BANK_PACKAGE_HINTS),
            Condition::TextContains(&["upi", "payment", "transaction"]),
        ]),
    },
    Rule {
        category: Category::Otp,
        condition: Condition::All(&[
            Condition::HasCodeDigits,
            Condition::TextContains(&["otp", "verification", "code"]),
        ]),
    },
    Rule {
        category: Category::SocialMedia,
        condition: Condition::PackageContains(&["facebook", "instagram", "twitter", "linkedin"]),
    },
];

struct Subject {
    package: String,
    text: String,
}

/// A standalone run of 4 to 6 ASCII digits.  `\d` would also accept
/// non-ASCII decimal digits.
fn code_digits() -> &'static Regex {
    static CODE_DIGITS: OnceLock<Regex> = OnceLock::new();
    CODE_DIGITS
        .get_or_init(|| Regex::new(r"\b[0-9]{4,6}\b").expect("code digit pattern is valid"))
}

/// Picks the category for a notification from `package_name` and its text.
pub fn categorize(package_name: &str, title: &str, content: &str) -> Category {
    let subject = Subject {
        package: package_name.to_lowercase(),
        text: format!("{title} {content}").to_lowercase(),
    };
    RULES
        .iter()
        .find(|rule| rule.condition.holds(&subject))
        .map(|rule| rule.category)
        .unwrap_or(Category::Other)
}

/// Derives a human-readable app name for `package_name`.
///
/// Falls back to the last dot-separated segment with its first character
/// upper-cased (`com.example.app` -> `App`), or the raw identifier when it has
/// no usable segment.
pub fn display_name(package_name: &str) -> String {
    if let Some((_, name)) = DISPLAY_NAMES
        .iter()
        .find(|(needle, _)| package_name.contains(needle))
    {
        return name.to_string();
    }

    let last = package_name
        .trim_end_matches('.')
        .rsplit('.')
        .next()
        .unwrap_or_default();
    let mut chars = last.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => package_name.to_string(),
    }
}

/// Attaches a category and display name to a normalized notification.
pub fn classify(event: &NormalizedEvent) -> ClassifiedEvent {
    ClassifiedEvent {
        package_name: event.package_name.clone(),
        display_name: display_name(&event.package_name),
        category: categorize(&event.package_name, &event.title, &event.content),
        title: event.title.clone(),
        content: event.content.clone(),
        posted_at_millis: event.posted_at_millis,
    }
}
