//! Extraction of packet statistics from the text printed by the system
//! `ping` tool.
//!
//! Parsing is line oriented and never fails: a field that cannot be read is
//! reset to its default and recorded as a [`ParseIssue`], and scanning moves on.

use super::platform::Platform;

const DEFAULT_PACKET_LOSS: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PingStatistics {
    pub packets_sent: u32,
    pub packets_received: u32,
    pub packet_loss_percent: f64,
    pub average_response_time_ms: Option<f64>,
}

impl PingStatistics {
    /// Values reported when nothing could be read.
    pub fn unparsed(packets_requested: u32) -> Self {
        Self {
            packets_sent: packets_requested,
            packets_received: 0,
            packet_loss_percent: DEFAULT_PACKET_LOSS,
            average_response_time_ms: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatField {
    PacketsSent,
    PacketsReceived,
    PacketLoss,
    AverageResponseTime,
}

/// A marker line was found but one of its fields could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIssue {
    pub field: StatField,
    pub line: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedOutput {
    pub stats: PingStatistics,
    pub issues: Vec<ParseIssue>,
}

impl ParsedOutput {
    pub fn is_degraded(&self) -> bool {
        !self.issues.is_empty()
    }
}

/// Parses ping output produced on `platform`.
///
/// `packets_requested` stands in for the sent count when the output does not
/// state it.
pub fn parse(output: &str, platform: Platform, packets_requested: u32) -> ParsedOutput {
    let mut parser = Parser {
        stats: PingStatistics::unparsed(packets_requested),
        packets_requested,
        issues: Vec::new(),
    };

    let output = output.to_lowercase();
    for line in output.lines() {
        match platform {
            Platform::Windows => parser.windows_line(line),
            Platform::Unix => parser.unix_line(line),
        }
    }

    for issue in &parser.issues {
        log::debug!("Unreadable {:?} in ping output line {:?}", issue.field, issue.line);
    }

    ParsedOutput {
        stats: parser.stats,
        issues: parser.issues,
    }
}

struct Parser {
    stats: PingStatistics,
    packets_requested: u32,
    issues: Vec<ParseIssue>,
}

impl Parser {
    // Packets: Sent = 4, Received = 4, Lost = 0 (0% loss),
    // Minimum = 1ms, Maximum = 4ms, Average = 2ms
    fn windows_line(&mut self, line: &str) {
        if line.contains("packets: sent") {
            for part in line.split(',') {
                if part.contains("received") {
                    self.set_received(line, value_after_eq(part).and_then(parse_count));
                } else if part.contains("% loss") {
                    let loss = part
                        .split_once('(')
                        .and_then(|(_, rest)| rest.split_once('%'))
                        .and_then(|(loss, _)| parse_percent(loss));
                    self.set_loss(line, loss);
                } else if part.contains("sent") {
                    self.set_sent(line, value_after_eq(part).and_then(parse_count));
                }
            }
        } else if line.contains("average") && line.contains("ms") {
            let average = line
                .split_once("average = ")
                .and_then(|(_, rest)| rest.split("ms").next())
                .and_then(parse_millis);
            self.set_average(line, average);
        }
    }

    // 4 packets transmitted, 4 received, 0% packet loss, time 3004ms
    // rtt min/avg/max/mdev = 1.234/2.345/3.456/0.123 ms
    fn unix_line(&mut self, line: &str) {
        if line.contains("packets transmitted") {
            let parts: Vec<&str> = line.split(',').collect();

            self.set_sent(line, leading_token(parts[0]).and_then(parse_count));
            self.set_received(
                line,
                parts.get(1).and_then(|p| leading_token(p)).and_then(parse_count),
            );

            // "+N errors" may sit between the received count and the loss figure.
            let loss_segment = parts
                .iter()
                .skip(2)
                .find(|p| p.contains('%'))
                .or_else(|| parts.get(2));
            let loss = loss_segment
                .and_then(|p| p.split_once('%'))
                .and_then(|(loss, _)| parse_percent(loss));
            self.set_loss(line, loss);
        } else if line.contains("avg") && line.contains('/') {
            let average = line
                .split('=')
                .nth(1)
                .and_then(|times| times.split('/').nth(1))
                .and_then(parse_millis);
            self.set_average(line, average);
        }
    }

    fn set_sent(&mut self, line: &str, value: Option<u32>) {
        self.stats.packets_sent = self
            .checked(StatField::PacketsSent, line, value)
            .unwrap_or(self.packets_requested);
    }

    fn set_received(&mut self, line: &str, value: Option<u32>) {
        self.stats.packets_received = self
            .checked(StatField::PacketsReceived, line, value)
            .unwrap_or(0);
    }

    fn set_loss(&mut self, line: &str, value: Option<f64>) {
        self.stats.packet_loss_percent = self
            .checked(StatField::PacketLoss, line, value)
            .unwrap_or(DEFAULT_PACKET_LOSS);
    }

    fn set_average(&mut self, line: &str, value: Option<f64>) {
        self.stats.average_response_time_ms =
            self.checked(StatField::AverageResponseTime, line, value);
    }

    fn checked<T>(&mut self, field: StatField, line: &str, value: Option<T>) -> Option<T> {
        if value.is_none() {
            self.issues.push(ParseIssue {
                field,
                line: line.trim().to_string(),
            });
        }
        value
    }
}

fn value_after_eq(part: &str) -> Option<&str> {
    part.split('=').nth(1).map(str::trim)
}

fn leading_token(segment: &str) -> Option<&str> {
    segment.split_whitespace().next()
}

fn parse_count(token: &str) -> Option<u32> {
    token.trim().parse().ok()
}

fn parse_percent(token: &str) -> Option<f64> {
    token
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|loss| (0.0..=100.0).contains(loss))
}

fn parse_millis(token: &str) -> Option<f64> {
    token
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|ms| ms.is_finite() && *ms >= 0.0)
}
