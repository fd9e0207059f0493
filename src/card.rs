use chrono::Local;
use inflections::case::to_title_case;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, List, ListItem, Widget};

use crate::models::{MailId, MailView, system};

/// State flags derived from one user's label list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CardFlags {
    pub starred: bool,
    pub read: bool,
    pub trash: bool,
    pub sent: bool,
    pub draft: bool,
}

impl CardFlags {
    pub fn from_labels(labels: &[String]) -> Self {
        let has = |name: &str| labels.iter().any(|l| l.eq_ignore_ascii_case(name));
        Self {
            starred: has(system::STAR),
            read: has(system::READ),
            trash: has(system::TRASH),
            sent: has(system::SENT),
            draft: has(system::DRAFTS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
}

impl Direction {
    pub fn glyph(self) -> &'static str {
        match self {
            Direction::Outgoing => "→",
            Direction::Incoming => "←",
        }
    }
}

/// Clickable actions shown on a card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icon {
    Star { filled: bool },
    Read { read: bool },
    Restore,
    Delete,
}

impl Icon {
    pub fn glyph(self) -> &'static str {
        match self {
            Icon::Star { filled: true } => "★",
            Icon::Star { filled: false } => "☆",
            Icon::Read { read: true } => "○",
            Icon::Read { read: false } => "●",
            Icon::Restore => "↺",
            Icon::Delete => "✕",
        }
    }
}

/// Summary of a mail as one user sees it in a list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailCard {
    pub id: MailId,
    pub counterpart: String,
    pub direction: Direction,
    pub subject: String,
    pub time: String,
    pub labels: Vec<String>,
    pub flags: CardFlags,
}

impl MailCard {
    pub fn new(mail: &MailView) -> Self {
        let flags = CardFlags::from_labels(&mail.labels);
        let (counterpart, direction) = if flags.sent {
            (mail.to_username.clone(), Direction::Outgoing)
        } else {
            (mail.from_username.clone(), Direction::Incoming)
        };

        Self {
            id: mail.id,
            counterpart,
            direction,
            subject: mail.subject.clone(),
            time: mail
                .timestamp
                .with_timezone(&Local)
                .format("%b %d %Y @ %-I:%M%p")
                .to_string(),
            labels: mail.labels.clone(),
            flags,
        }
    }

    pub fn icons(&self) -> Vec<Icon> {
        let mut icons = Vec::with_capacity(3);
        if self.flags.trash {
            icons.push(Icon::Restore);
        } else {
            icons.push(Icon::Star {
                filled: self.flags.starred,
            });
        }
        icons.push(Icon::Read {
            read: self.flags.read,
        });
        icons.push(Icon::Delete);
        icons
    }

    /// Label names for display
    pub fn display_labels(&self) -> Vec<String> {
        self.labels.iter().map(|l| to_title_case(l.as_str())).collect()
    }

    pub fn to_list_item(&self, width: usize, selected: bool) -> ListItem<'static> {
        let mut style = if selected {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        if !self.flags.read {
            style = style.add_modifier(Modifier::BOLD);
        }

        let who = match self.direction {
            Direction::Outgoing => "To",
            Direction::Incoming => "From",
        };
        let icons: Vec<&str> = self.icons().into_iter().map(Icon::glyph).collect();
        let labels = self
            .display_labels()
            .iter()
            .map(|l| format!("[{}]", l))
            .collect::<Vec<_>>()
            .join(" ");
        let subject = if self.subject.is_empty() {
            "(No Subject)"
        } else {
            self.subject.as_str()
        };

        let line1 = fit(
            format!(" {} {}: {}  {}", self.direction.glyph(), who, self.counterpart, icons.join(" ")),
            width,
        );
        let line2 = fit(format!(" Time: {}  {}", self.time, labels), width);
        let line3 = fit(format!(" Subj: {}", subject), width);

        let indicator = if selected { "█" } else { " " };
        ListItem::new(format!(
            "{}{}\n{}{}\n{}{}",
            indicator, line1, indicator, line2, indicator, line3
        ))
        .style(style)
    }
}

/// Pad or truncate to exactly `len` characters
fn fit(s: String, len: usize) -> String {
    let count = s.chars().count();
    if count > len {
        let truncated: String = s.chars().take(len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    } else {
        format!("{:width$}", s, width = len)
    }
}

pub fn card_list(cards: &[MailCard], width: u16, selected: Option<usize>, title: &str) -> List<'static> {
    let inner = width.saturating_sub(3) as usize;
    let items: Vec<ListItem> = cards
        .iter()
        .enumerate()
        .map(|(i, card)| card.to_list_item(inner, selected == Some(i)))
        .collect();

    List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title.to_string())
            .border_style(Style::default().fg(Color::Cyan)),
    )
}

/// Draw the cards off-screen and return the result as plain text lines
pub fn render_text(cards: &[MailCard], width: u16, title: &str) -> String {
    let height = (cards.len() as u16).saturating_mul(3).saturating_add(2);
    let area = Rect::new(0, 0, width, height);
    let mut buf = Buffer::empty(area);
    card_list(cards, width, None, title).render(area, &mut buf);

    let mut out = String::new();
    for y in 0..height {
        let line: String = (0..width)
            .map(|x| buf.cell((x, y)).map(|c| c.symbol()).unwrap_or(" "))
            .collect();
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn mail(labels: &[&str]) -> MailView {
        MailView {
            id: 7,
            from_user_id: 1,
            to_user_id: 2,
            from_username: "alice".to_string(),
            to_username: "bob".to_string(),
            subject: "Lunch?".to_string(),
            body: "Noon at the usual place".to_string(),
            timestamp: Utc::now(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
        }
    }

    #[test]
    fn test_flags_are_case_insensitive() {
        let flags = CardFlags::from_labels(&["STAR".to_string(), "Drafts".to_string()]);
        assert!(flags.starred);
        assert!(flags.draft);
        assert!(!flags.read);
        assert!(!flags.trash);
    }

    #[test]
    fn test_counterpart_follows_direction() {
        let sent = MailCard::new(&mail(&["sent", "read"]));
        assert_eq!(sent.counterpart, "bob");
        assert_eq!(sent.direction, Direction::Outgoing);

        let received = MailCard::new(&mail(&["received", "unread"]));
        assert_eq!(received.counterpart, "alice");
        assert_eq!(received.direction.glyph(), "←");
    }

    #[test]
    fn test_icons_in_and_out_of_trash() {
        let normal = MailCard::new(&mail(&["received", "star"]));
        assert_eq!(
            normal.icons(),
            vec![Icon::Star { filled: true }, Icon::Read { read: false }, Icon::Delete]
        );

        let trashed = MailCard::new(&mail(&["trash", "read"]));
        assert_eq!(
            trashed.icons(),
            vec![Icon::Restore, Icon::Read { read: true }, Icon::Delete]
        );
    }

    #[test]
    fn test_display_labels_are_title_cased() {
        let card = MailCard::new(&mail(&["received", "project updates"]));
        assert_eq!(card.display_labels(), vec!["Received", "Project Updates"]);
    }

    #[test]
    fn test_fit_pads_and_truncates() {
        assert_eq!(fit("abc".to_string(), 5), "abc  ");
        assert_eq!(fit("abcdefgh".to_string(), 6), "abc...");
    }

    #[test]
    fn test_render_text() {
        let cards = vec![
            MailCard::new(&mail(&["sent", "read"])),
            MailCard::new(&mail(&["received", "unread"])),
        ];
        let text = render_text(&cards, 80, "Inbox");
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 8);
        assert!(lines[0].contains("Inbox"));
        assert!(text.contains("→ To: bob"));
        assert!(text.contains("← From: alice"));
        assert!(text.contains("Subj: Lunch?"));
        assert!(text.contains("[Unread]"));
    }
}
