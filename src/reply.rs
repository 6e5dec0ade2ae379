//! Reply table
//!
//! Maps exact inbound text to a reply. Matching is case-sensitive string
//! equality; anything that matches no trigger falls through to the fallback
//! rule. Time and date rules read the local wall clock through [`Clock`].

use chrono::{Local, NaiveDateTime};
use std::fmt;

pub const TIME_FORMAT: &str = "%H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Reply to the `Info` trigger
pub const INFO_REPLY: &str = "Saya adalah bot WhatsApp sederhana dibuat dengan Rust.";

/// Source of local wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Reads the system's local time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Always returns the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// How a reply is produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyRule {
    /// Fixed text
    Static(String),
    /// `prefix` followed by the current time (`HH:MM:SS`)
    Time { prefix: String },
    /// `prefix` followed by the current date (`YYYY-MM-DD`)
    Date { prefix: String },
    /// `prefix` followed by the inbound text
    Echo { prefix: String },
}

impl ReplyRule {
    pub fn render(&self, text: &str, now: NaiveDateTime) -> String {
        match self {
            Self::Static(reply) => reply.clone(),
            Self::Time { prefix } => format!("{}{}", prefix, now.format(TIME_FORMAT)),
            Self::Date { prefix } => format!("{}{}", prefix, now.format(DATE_FORMAT)),
            Self::Echo { prefix } => format!("{}{}", prefix, text),
        }
    }
}

impl fmt::Display for ReplyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(reply) => write!(f, "{}", reply),
            Self::Time { prefix } => write!(f, "{}<{}>", prefix, TIME_FORMAT),
            Self::Date { prefix } => write!(f, "{}<{}>", prefix, DATE_FORMAT),
            Self::Echo { prefix } => write!(f, "{}<text>", prefix),
        }
    }
}

/// Ordered trigger table plus fallback. Immutable once built.
#[derive(Debug, Clone)]
pub struct ReplyTable {
    rules: Vec<(String, ReplyRule)>,
    fallback: ReplyRule,
}

impl ReplyTable {
    pub fn builder() -> ReplyTableBuilder {
        ReplyTableBuilder::default()
    }

    /// The rule for `text`: the first exact trigger match, else the fallback
    pub fn rule_for(&self, text: &str) -> &ReplyRule {
        self.rules
            .iter()
            .find(|(trigger, _)| trigger == text)
            .map(|(_, rule)| rule)
            .unwrap_or(&self.fallback)
    }

    /// Reply for `text` at wall-clock time `now`
    pub fn resolve(&self, text: &str, now: NaiveDateTime) -> String {
        self.rule_for(text).render(text, now)
    }

    pub fn rules(&self) -> &[(String, ReplyRule)] {
        &self.rules
    }

    pub fn fallback(&self) -> &ReplyRule {
        &self.fallback
    }
}

impl Default for ReplyTable {
    fn default() -> Self {
        Self::builder()
            .rule("Halo", ReplyRule::Static("Hai! Ada yang bisa saya bantu?".to_string()))
            .rule(
                "Waktu",
                ReplyRule::Time {
                    prefix: "Waktu saat ini: ".to_string(),
                },
            )
            .rule(
                "Tanggal",
                ReplyRule::Date {
                    prefix: "Tanggal hari ini: ".to_string(),
                },
            )
            .rule(
                "Info",
                ReplyRule::Static(INFO_REPLY.to_string()),
            )
            .build()
    }
}

/// Builder for [`ReplyTable`]
#[derive(Debug)]
pub struct ReplyTableBuilder {
    rules: Vec<(String, ReplyRule)>,
    fallback: ReplyRule,
}

impl Default for ReplyTableBuilder {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            fallback: ReplyRule::Echo {
                prefix: "Anda mengirim: ".to_string(),
            },
        }
    }
}

impl ReplyTableBuilder {
    /// Append a trigger. Earlier triggers win on duplicates.
    pub fn rule(mut self, trigger: impl Into<String>, rule: ReplyRule) -> Self {
        self.rules.push((trigger.into(), rule));
        self
    }

    pub fn fallback(mut self, rule: ReplyRule) -> Self {
        self.fallback = rule;
        self
    }

    pub fn build(self) -> ReplyTable {
        ReplyTable {
            rules: self.rules,
            fallback: self.fallback,
        }
    }
}
