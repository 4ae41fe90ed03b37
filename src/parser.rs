// 🏗️ Payroll Parser - Pre-cleaned lines → structured settlement input
//
// Three sections, each opened by an exact marker line:
//   KONTENTY:     sessions ("contents") and their hauls
//   CTA:          standalone participation events
//   REKRUTACJA:   recruitment credits
//
// Parsing is permissive: a line that does not fit its grammar is dropped and a
// ParseDiagnostic records why. Every name reference goes through the shared
// ParticipantRegistry, so one name always maps to one participant.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::config::SettlementConfig;
use crate::entities::{HaulParticipant, ParticipantId, ParticipantRegistry, Share};

// ============================================================================
// CORE TYPES
// ============================================================================

/// One loot-and-cash drop as written in the input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaulInput {
    pub items_before_tax: i64,
    pub cash_before_tax: i64,
    pub location: String,
    pub tab: String,

    /// Was the session organizer present for this drop
    pub had_organizer: bool,

    pub caller: Option<HaulParticipant>,

    /// De-duplicated by identity, in input order
    pub participants: Vec<HaulParticipant>,
}

impl HaulInput {
    /// Create a haul with no roles assigned yet
    pub fn new(items_before_tax: i64, cash_before_tax: i64, location: &str, tab: &str) -> Self {
        HaulInput {
            items_before_tax,
            cash_before_tax,
            location: location.to_string(),
            tab: tab.to_string(),
            had_organizer: false,
            caller: None,
            participants: Vec::new(),
        }
    }

    /// Builder pattern: mark the organizer as present
    pub fn with_organizer_present(mut self) -> Self {
        self.had_organizer = true;
        self
    }

    /// Builder pattern: set the caller
    pub fn with_caller(mut self, caller: HaulParticipant) -> Self {
        self.caller = Some(caller);
        self
    }

    /// Builder pattern: add a participant (ignored if the identity is already present)
    pub fn with_participant(mut self, participant: HaulParticipant) -> Self {
        self.add_participant(participant);
        self
    }

    /// Add a participant; returns false when the identity was already on the haul
    pub fn add_participant(&mut self, participant: HaulParticipant) -> bool {
        if self.participants.iter().any(|p| p.id == participant.id) {
            return false;
        }
        self.participants.push(participant);
        true
    }
}

/// One session ("content"): hauls plus an optional organizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentInput {
    pub id: u32,
    pub organizer: Option<ParticipantId>,
    pub hauls: Vec<HaulInput>,
}

/// Standalone participation event (return points only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtaInput {
    pub id: u32,
    pub caller: ParticipantId,
    pub participants: Vec<ParticipantId>,
}

/// Literal return-point credit for a recruiter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecruitmentInput {
    pub recruiter: ParticipantId,
    pub points: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// The whole line was discarded
    DroppedLine,

    /// A field could not be parsed and fell back to zero
    DefaultedField,

    /// Part of a line was ignored, the rest was kept
    IgnoredValue,
}

/// Why a line (or part of it) did not make it into the parsed input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseDiagnostic {
    /// 1-based position in the line sequence handed to the parser
    pub line_number: usize,
    pub line: String,
    pub kind: DiagnosticKind,
    pub reason: String,
}

/// Output of the parser: structured input plus the shared registry
#[derive(Debug, Clone, Default)]
pub struct ParsedInput {
    pub contents: Vec<ContentInput>,
    pub events: Vec<CtaInput>,
    pub recruitments: Vec<RecruitmentInput>,
    pub registry: ParticipantRegistry,
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl ParsedInput {
    pub fn dropped_lines(&self) -> impl Iterator<Item = &ParseDiagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::DroppedLine)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Contents,
    Events,
    Recruitments,
}

// ============================================================================
// PARSER
// ============================================================================

pub struct PayrollParser {
    config: SettlementConfig,
}

/// State threaded through one parse run
struct ParseRun<'a> {
    config: &'a SettlementConfig,
    output: ParsedInput,
}

impl PayrollParser {
    pub fn new() -> Self {
        PayrollParser {
            config: SettlementConfig::default(),
        }
    }

    pub fn with_config(config: &SettlementConfig) -> Self {
        PayrollParser {
            config: config.clone(),
        }
    }

    /// Read a file and parse it; diagnostics carry file line numbers
    pub fn parse_file(&self, file_path: &Path) -> Result<ParsedInput> {
        let content = fs::read_to_string(file_path)
            .with_context(|| format!("Failed to open file: {}", file_path.display()))?;

        let lines: Vec<&str> = content.lines().collect();
        Ok(self.parse_lines(&lines))
    }

    /// Parse an ordered sequence of lines
    ///
    /// Blank and `#` comment lines are skipped here too, so raw fixtures work.
    pub fn parse_lines<S: AsRef<str>>(&self, lines: &[S]) -> ParsedInput {
        let mut run = ParseRun {
            config: &self.config,
            output: ParsedInput::default(),
        };
        let mut section: Option<Section> = None;

        for (position, raw) in lines.iter().enumerate() {
            let line = raw.as_ref();
            let line_number = position + 1;

            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(next) = self.section_marker(line) {
                debug!(line_number, section = ?next, "section marker");
                section = Some(next);
                continue;
            }

            match section {
                None => run.diagnose(
                    line_number,
                    line,
                    DiagnosticKind::DroppedLine,
                    "line precedes the first section marker",
                ),
                Some(Section::Contents) => run.parse_contents_line(line_number, line),
                Some(Section::Events) => run.parse_event_line(line_number, line),
                Some(Section::Recruitments) => run.parse_recruitment_line(line_number, line),
            }
        }

        let output = run.output;
        info!(
            sessions = output.contents.len(),
            hauls = output.contents.iter().map(|c| c.hauls.len()).sum::<usize>(),
            events = output.events.len(),
            recruitments = output.recruitments.len(),
            participants = output.registry.count(),
            diagnostics = output.diagnostics.len(),
            "parsed payroll input"
        );
        output
    }

    fn section_marker(&self, line: &str) -> Option<Section> {
        let trimmed = line.trim();
        let markers = &self.config.markers;

        if trimmed == markers.contents {
            Some(Section::Contents)
        } else if trimmed == markers.events {
            Some(Section::Events)
        } else if trimmed == markers.recruitments {
            Some(Section::Recruitments)
        } else {
            None
        }
    }
}

impl Default for PayrollParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse with default markers and grammar
pub fn parse_payroll_input<S: AsRef<str>>(lines: &[S]) -> ParsedInput {
    PayrollParser::new().parse_lines(lines)
}

/// Participant-name grammar: trim, case-fold, strip the reduced-share suffix
///
/// Examples (suffix "(50%)"):
/// - "player1"          → ("player1", Full)
/// - "player2(50%)"     → ("player2", Half)
/// - " player4 (50%) "  → ("player4", Half)
pub fn parse_participant(raw: &str, reduced_share_suffix: &str) -> (String, Share) {
    let name = raw.trim().to_lowercase();
    let suffix = reduced_share_suffix.to_lowercase();

    if !suffix.is_empty() {
        if let Some(stripped) = name.strip_suffix(suffix.as_str()) {
            return (stripped.trim().to_string(), Share::Half);
        }
    }

    (name, Share::Full)
}

fn session_header() -> &'static Regex {
    static SESSION_HEADER: OnceLock<Regex> = OnceLock::new();
    SESSION_HEADER.get_or_init(|| {
        Regex::new(r"^([0-9]+):(.*)$").expect("session header pattern is a valid regex")
    })
}

// ============================================================================
// LINE GRAMMARS
// ============================================================================

impl<'a> ParseRun<'a> {
    fn diagnose(&mut self, line_number: usize, line: &str, kind: DiagnosticKind, reason: &str) {
        warn!(line_number, kind = ?kind, reason, line, "payroll input line not fully parsed");
        self.output.diagnostics.push(ParseDiagnostic {
            line_number,
            line: line.to_string(),
            kind,
            reason: reason.to_string(),
        });
    }

    fn register(&mut self, name: &str) -> ParticipantId {
        self.output.registry.get_or_create(name)
    }

    /// Session header ("12: organizer") or a haul line of the current session
    fn parse_contents_line(&mut self, line_number: usize, line: &str) {
        if let Some(captures) = session_header().captures(line) {
            let id = match captures[1].parse::<u32>() {
                Ok(id) => id,
                Err(_) => {
                    self.diagnose(
                        line_number,
                        line,
                        DiagnosticKind::DefaultedField,
                        "session id out of range, using 0",
                    );
                    0
                }
            };

            let organizer_field = captures[2].split(':').next().unwrap_or("").trim().to_string();
            let organizer = if organizer_field.is_empty() {
                None
            } else {
                let (name, share) =
                    parse_participant(&organizer_field, &self.config.reduced_share_suffix);
                if share == Share::Half {
                    // Organizers are always credited at full share
                    self.diagnose(
                        line_number,
                        line,
                        DiagnosticKind::IgnoredValue,
                        "reduced share is not supported for organizers, crediting full share",
                    );
                }
                if name.is_empty() {
                    None
                } else {
                    Some(self.register(&name))
                }
            };

            self.output.contents.push(ContentInput {
                id,
                organizer,
                hauls: Vec::new(),
            });
            return;
        }

        if self.output.contents.is_empty() {
            self.diagnose(
                line_number,
                line,
                DiagnosticKind::DroppedLine,
                "haul line appears before any session header",
            );
            return;
        }

        if let Some(haul) = self.parse_haul_line(line_number, line) {
            if let Some(content) = self.output.contents.last_mut() {
                content.hauls.push(haul);
            }
        }
    }

    /// "‹index›: ‹items›,‹cash›,‹location›,‹tab›,‹organizer-flag›,‹caller›,‹participant›[,...]"
    fn parse_haul_line(&mut self, line_number: usize, line: &str) -> Option<HaulInput> {
        let Some((_, data)) = line.split_once(':') else {
            self.diagnose(
                line_number,
                line,
                DiagnosticKind::DroppedLine,
                "haul line has no ':' separator",
            );
            return None;
        };

        let fields: Vec<&str> = data.split(',').map(str::trim).collect();
        if fields.len() < 7 {
            let reason = format!("haul line needs at least 7 fields, found {}", fields.len());
            self.diagnose(line_number, line, DiagnosticKind::DroppedLine, &reason);
            return None;
        }

        let items_before_tax = self.parse_amount(line_number, line, fields[0], "items");
        let cash_before_tax = self.parse_amount(line_number, line, fields[1], "cash");
        let mut haul = HaulInput::new(items_before_tax, cash_before_tax, fields[2], fields[3]);
        haul.had_organizer = fields[4].to_lowercase() == self.config.affirmative_token.to_lowercase();

        if !fields[5].is_empty() {
            let (name, share) = parse_participant(fields[5], &self.config.reduced_share_suffix);
            if name.is_empty() {
                self.diagnose(
                    line_number,
                    line,
                    DiagnosticKind::IgnoredValue,
                    "caller field has no name",
                );
            } else {
                let id = self.register(&name);
                haul.caller = Some(HaulParticipant::new(id, share));
            }
        }

        for field in &fields[6..] {
            if field.is_empty() {
                continue;
            }
            let (name, share) = parse_participant(field, &self.config.reduced_share_suffix);
            if name.is_empty() {
                self.diagnose(
                    line_number,
                    line,
                    DiagnosticKind::IgnoredValue,
                    "participant field has no name",
                );
                continue;
            }
            let id = self.register(&name);
            if !haul.add_participant(HaulParticipant::new(id, share)) {
                let reason = format!("duplicate participant '{}' on haul, keeping first", name);
                self.diagnose(line_number, line, DiagnosticKind::IgnoredValue, &reason);
            }
        }

        if haul.participants.is_empty() {
            self.diagnose(
                line_number,
                line,
                DiagnosticKind::IgnoredValue,
                "haul has no participants",
            );
        }

        Some(haul)
    }

    /// Amount in thousands → currency units; blank is 0, garbage is 0 with a diagnostic
    fn parse_amount(&mut self, line_number: usize, line: &str, field: &str, label: &str) -> i64 {
        if field.is_empty() {
            return 0;
        }

        let scaled = field
            .parse::<i64>()
            .ok()
            .filter(|value| *value >= 0)
            .and_then(|value| value.checked_mul(self.config.amount_scale));

        match scaled {
            Some(amount) => amount,
            None => {
                let reason = format!("unparsable {} value '{}', using 0", label, field);
                self.diagnose(line_number, line, DiagnosticKind::DefaultedField, &reason);
                0
            }
        }
    }

    /// "‹id›: ‹caller› - ‹p1›,‹p2›,…"
    fn parse_event_line(&mut self, line_number: usize, line: &str) {
        let parts: Vec<&str> = line.split(':').map(str::trim).collect();
        if parts.len() != 2 {
            self.diagnose(
                line_number,
                line,
                DiagnosticKind::DroppedLine,
                "event line must look like '<id>: <caller> - <participants>'",
            );
            return;
        }

        let roles: Vec<&str> = parts[1].split('-').map(str::trim).collect();
        if roles.len() != 2 || roles[0].is_empty() {
            self.diagnose(
                line_number,
                line,
                DiagnosticKind::DroppedLine,
                "event line needs exactly one '<caller> - <participants>' pair",
            );
            return;
        }

        let id = match parts[0].parse::<u32>() {
            Ok(id) => id,
            Err(_) => {
                self.diagnose(
                    line_number,
                    line,
                    DiagnosticKind::DefaultedField,
                    "unparsable event id, using 0",
                );
                0
            }
        };

        let caller = self.register(roles[0]);
        let mut participants: Vec<ParticipantId> = Vec::new();
        for name in roles[1].split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let participant = self.register(name);
            if !participants.contains(&participant) {
                participants.push(participant);
            }
        }

        self.output.events.push(CtaInput {
            id,
            caller,
            participants,
        });
    }

    /// "‹recruiter›: ‹points›"
    fn parse_recruitment_line(&mut self, line_number: usize, line: &str) {
        let parts: Vec<&str> = line.split(':').map(str::trim).collect();
        if parts.len() != 2 || parts[0].is_empty() {
            self.diagnose(
                line_number,
                line,
                DiagnosticKind::DroppedLine,
                "recruitment line must look like '<recruiter>: <points>'",
            );
            return;
        }

        let points = match parts[1].parse::<f64>() {
            Ok(points) if points.is_finite() && points >= 0.0 => points,
            _ => {
                let reason = format!(
                    "negative or unparsable recruitment points '{}', using 0",
                    parts[1]
                );
                self.diagnose(line_number, line, DiagnosticKind::DefaultedField, &reason);
                0.0
            }
        };

        let recruiter = self.register(parts[0]);
        self.output
            .recruitments
            .push(RecruitmentInput { recruiter, points });
    }
}

// ============================================================================
// TESTS
// ============================================================================
