use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use serde::Serialize;
use tracing::info;

use crate::catalog::MusicCatalog;
use crate::error::PipelineError;
use crate::links::ReachabilityProbe;
use crate::survey::{Respondent, SURVEY_YEARS};
use crate::util::write_json_pretty;
use crate::valence::{Score, ValenceAggregator};

pub const SENDER_NAME: &str = "The MoodOfMusic Team";
pub const SUBJECT: &str = "Your Mood of Music Results!";

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub name: String,
    pub email: String,
    pub scores: BTreeMap<String, Score>,
}

pub fn build_notifications<C: MusicCatalog, P: ReachabilityProbe>(
    respondents: &[Respondent],
    aggregator: &ValenceAggregator<'_, C, P>,
) -> Result<Vec<Notification>, PipelineError> {
    let mut notifications = Vec::with_capacity(respondents.len());
    for respondent in respondents {
        let mut scores = BTreeMap::new();
        for (year, link) in SURVEY_YEARS.iter().zip(&respondent.links) {
            scores.insert(year.to_string(), aggregator.average_valence(link)?);
        }
        notifications.push(Notification {
            name: respondent.name.clone(),
            email: respondent.email.clone(),
            scores,
        });
    }
    Ok(notifications)
}

#[derive(Debug, Clone, Serialize)]
pub struct ComposedMessage {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub body: String,
    /// URL-safe base64 of the full RFC 822 message.
    pub raw: String,
}

fn year_line(year: &str, score: Score) -> String {
    match score {
        Score::Valence(value) => format!("In {year}, you were about {value} happy."),
        sentinel => format!("In {year}: {sentinel}."),
    }
}

const INTRO: [&str; 5] = [
    "We are the YourMoodOfMusic SoftDes Team, and you are receiving this email \
     because you responded to our survey.",
    "Our project aimed to determine how happy a person was in a specific year \
     based on their Spotify Wrapped.",
    "We used 'valence' values, provided by Spotify, to calculate the average \
     happiness value of the songs in your playlist.",
    "These valence values range from 0 to 1, with higher scores meaning more happiness!",
    "For those of you who were curious about your own valence scores... \
     Here are the results!",
];

pub fn compose(notification: &Notification) -> ComposedMessage {
    let mut paragraphs = vec![format!("Hey {}!", notification.name)];
    paragraphs.extend(INTRO.iter().map(|line| line.to_string()));
    for (year, score) in &notification.scores {
        paragraphs.push(year_line(year, *score));
    }
    paragraphs.push("Thank you for being part of our project!".to_string());
    let body = paragraphs.join("\n\n");

    let rfc822 = format!(
        "To: {to}\r\nFrom: {SENDER_NAME}\r\nSubject: {SUBJECT}\r\nMIME-Version: 1.0\r\n\
         Content-Type: text/plain; charset=\"utf-8\"\r\n\r\n{body}",
        to = notification.email,
    );

    ComposedMessage {
        to: notification.email.clone(),
        from: SENDER_NAME.to_string(),
        subject: SUBJECT.to_string(),
        raw: URL_SAFE.encode(rfc822.as_bytes()),
        body,
    }
}

pub trait NotificationSender {
    fn deliver(&mut self, message: &ComposedMessage) -> Result<()>;
}

/// Writes each message to `<dir>/<nnn>-<address>.json`.
pub struct OutboxSender {
    dir: PathBuf,
    written: usize,
}

impl OutboxSender {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir, written: 0 }
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl NotificationSender for OutboxSender {
    fn deliver(&mut self, message: &ComposedMessage) -> Result<()> {
        let stem: String = message
            .to
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
            .collect();
        let path = self.dir.join(format!("{:03}-{stem}.json", self.written + 1));
        write_json_pretty(&path, message)?;
        self.written += 1;
        info!(path = %path.display(), to = %message.to, "queued result email");
        Ok(())
    }
}
