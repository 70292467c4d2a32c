//! Canned inbox for demos and tests.
//!
//! Twenty mixed emails: support tickets, sales leads, internal updates and
//! personal notes. Used when no IMAP server is configured.

use async_trait::async_trait;

use super::{MailSource, RawEmail};
use crate::error::MailError;

const SAMPLE_INBOX: &[(&str, &str)] = &[
    (
        "Meeting follow-up",
        "Hi team, just following up on yesterday's meeting. Let me know if we can finalize the plan this week.\n\n\
         To recap, we discussed the project milestones, the timeline adjustments due to resource constraints, \
         and the risks around hardware procurement. Action items: Sarah prepares the updated budget, \
         Alex confirms supplier delivery dates, and I draft the revised Gantt chart by Thursday.",
    ),
    (
        "Product inquiry",
        "Hello, I'd like to know if Nova is already available for pre-order. Thanks!\n\n\
         I saw your product at the MaterIA showcase and I'm interested in the AI-assisted automation features. \
         Could you share details on shipping options, warranty coverage and bundles?",
    ),
    (
        "Issue with installation",
        "Hi support, I had some trouble installing the device on Windows. Could you provide guidance?\n\n\
         The setup guide seems outdated: the driver installation failed on step 3 with a missing dependency error. \
         I retried on a second computer and hit the same issue. Screenshots are attached.",
    ),
    (
        "Lunch tomorrow?",
        "Hey Alex, are you free for lunch tomorrow around 1pm? Let me know.\n\n\
         We could try the new café near the office. If tomorrow doesn't work, Thursday or Friday are fine too.",
    ),
    (
        "Job application",
        "Dear HR, I'm interested in applying for the Software Engineer role. Please find my CV attached.\n\n\
         I have over five years of backend experience focused on distributed systems and API design, \
         and I'm excited about your focus on AI-driven innovation.",
    ),
    (
        "Conference registration",
        "Good morning, I'd like to register for the MaterIA Innovation Summit. Could you confirm my spot?\n\n\
         Please let me know the benefits of each pass tier and whether meals and networking sessions are included.",
    ),
    (
        "Weekly report",
        "Hi all, please find attached the weekly progress report. Highlights include milestones reached on Nova's firmware.\n\n\
         We completed phase 2 of testing, patched three critical bugs, and improved power efficiency by 12%. \
         Next week we focus on integration testing with partner systems.",
    ),
    (
        "Thanks!",
        "Thanks for your help with the prototype setup yesterday, it saved us a lot of time!\n\n\
         The client was impressed with the working demo. I'll note your contribution in the project highlights.",
    ),
    (
        "Invoice #2456",
        "Dear Finance Team, please see the attached invoice for last month's services. Payment is due in 14 days.\n\n\
         It covers consulting hours, hardware rentals and support services. Late payments incur a small fee.",
    ),
    (
        "Request for refund",
        "Hello, I'd like to request a refund for order #8723. The device didn't match my expectations.\n\n\
         The integration with my workflow tools was not as seamless as advertised. \
         Please advise on the refund timeline and whether return shipping is covered.",
    ),
    (
        "New feature suggestion",
        "Hi, it would be amazing if Nova could sync with calendar apps directly. Is this planned?\n\n\
         Automatic reminders in Google or Outlook calendars would save a lot of duplicate work. \
         Happy to join a beta if it's on the roadmap.",
    ),
    (
        "Weekend plans",
        "Hey Alex, any plans for the weekend? Thinking of organizing a hike.\n\n\
         The weather looks great for Saturday and there's a new trail near the river.",
    ),
    (
        "Media inquiry",
        "Good afternoon, I'm writing a feature on AI startups. Would someone be available for a short interview?\n\n\
         Your team's work on Nova caught my attention. Could we schedule 30 minutes this week?",
    ),
    (
        "Account access issue",
        "Hello support, I can't log into my MaterIA account. Can you reset my password?\n\n\
         The reset link keeps redirecting me to the login page. I'm on a deadline, please advise urgently.",
    ),
    (
        "Bulk order request",
        "Hi sales, I'm interested in ordering 50 Nova units for my company. Could you provide a quote?\n\n\
         Please include bulk discounts, estimated shipping costs and warranty coverage. \
         We hope to close before the end of the quarter.",
    ),
    (
        "Demo feedback",
        "The Nova demo was really impressive. Great job to everyone involved!\n\n\
         The UI was intuitive and the third-party integrations were seamless.",
    ),
    (
        "Career advice",
        "Dear mentor, I'd love to get your advice on pursuing a career in AI research. Could we schedule a call?\n\n\
         I'm unsure whether to focus on theoretical foundations or applied research.",
    ),
    (
        "Shipping delay",
        "Hi support, my order has been delayed for two weeks. Can you provide an update?\n\n\
         Tracking hasn't updated since August 30th and the order is critical for an event we're hosting.",
    ),
    (
        "Team outing",
        "Hey team, how about a team outing next Friday? It's been a while since we all hung out.\n\n\
         Bowling followed by dinner? Reply with your availability.",
    ),
    (
        "Quick question",
        "Alex, do you know if the firmware update is backwards compatible? Just need to confirm.\n\n\
         We're rolling it out across several departments and older hardware is a concern.",
    ),
];

/// The canned inbox as raw emails, newest first.
pub fn sample_inbox() -> Vec<RawEmail> {
    SAMPLE_INBOX
        .iter()
        .map(|(subject, body)| RawEmail::new(*subject, *body))
        .collect()
}

/// Mail source that serves a fixed list of emails.
pub struct FixtureMailSource {
    emails: Vec<RawEmail>,
}

impl FixtureMailSource {
    pub fn new(emails: Vec<RawEmail>) -> Self {
        Self { emails }
    }

    /// The built-in twenty-email sample inbox.
    pub fn sample() -> Self {
        Self::new(sample_inbox())
    }
}

#[async_trait]
impl MailSource for FixtureMailSource {
    fn name(&self) -> &str {
        "fixture"
    }

    async fn fetch(&self, n: usize) -> Result<Vec<RawEmail>, MailError> {
        Ok(self.emails.iter().take(n).cloned().collect())
    }
}
