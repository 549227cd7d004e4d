/// Crawl phase definitions
///
/// One run walks `Start → FormFill → FirstPage → FollowPages → Done` without
/// cycles or backtracking.
use std::fmt;

/// Represents the current phase of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// Nothing fetched yet; the search form page is requested next
    Start,

    /// Search form received; the query window is planned and submitted
    FormFill,

    /// First results page received; its rows and page links are extracted
    FirstPage,

    /// Remaining result pages are fetched and parsed
    FollowPages,

    /// All discovered pages have been consumed
    Done,
}

impl CrawlPhase {
    /// Returns the phase that follows this one, if any
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Start => Some(Self::FormFill),
            Self::FormFill => Some(Self::FirstPage),
            Self::FirstPage => Some(Self::FollowPages),
            Self::FollowPages => Some(Self::Done),
            Self::Done => None,
        }
    }

    /// Returns true if moving from this phase to `to` is allowed
    pub fn can_transition_to(&self, to: Self) -> bool {
        self.next() == Some(to)
    }

    /// Returns true once the run has nothing left to do
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::FormFill => "form_fill",
            Self::FirstPage => "first_page",
            Self::FollowPages => "follow_pages",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
