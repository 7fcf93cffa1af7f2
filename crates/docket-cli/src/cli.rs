use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "docket",
    about = "Docket: event-request coordination with broadcast review and claim leases",
    version
)]
pub struct Cli {
    /// Workspace directory holding the request store and config
    #[arg(long, global = true, default_value = ".docket")]
    pub dir: String,

    /// Log filter (tracing EnvFilter syntax)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the workspace layout (store, settings, tables)
    Init {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Request lifecycle operations
    Request {
        #[command(subcommand)]
        command: RequestCommands,
    },

    /// Acquire the claim lease on a request
    Claim {
        /// Request ID
        id: String,

        /// Acting coordinator user ID
        #[arg(long)]
        user: String,

        /// Explicit lease TTL in seconds
        #[arg(long)]
        ttl: Option<i64>,

        /// Use the longer hold window instead of the active window
        #[arg(long)]
        hold: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Release the caller's claim lease
    Release {
        /// Request ID
        id: String,

        /// Acting coordinator user ID
        #[arg(long)]
        user: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reassign the reviewer within the frozen eligible set
    Override {
        /// Request ID
        id: String,

        /// Acting administrator user ID
        #[arg(long)]
        user: String,

        /// New reviewer's user ID
        #[arg(long)]
        coordinator: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum RequestCommands {
    /// Submit a new event request
    Create {
        /// Requesting user ID
        #[arg(long)]
        requester: String,

        /// Event title
        #[arg(long)]
        title: String,

        /// Event date (YYYY-MM-DD)
        #[arg(long)]
        date: String,

        /// Start time (HH:MM)
        #[arg(long)]
        start: String,

        /// End time (HH:MM)
        #[arg(long)]
        end: String,

        /// Location ID used for coverage and permission scoping
        #[arg(long)]
        location: String,

        /// Free-form notes
        #[arg(long, default_value = "")]
        notes: String,

        /// Rejected parent request ID for a resubmission
        #[arg(long)]
        parent: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List requests
    List {
        /// Filter by canonical status
        #[arg(long)]
        status: Option<String>,

        /// Filter by eligible or assigned coordinator
        #[arg(long)]
        coordinator: Option<String>,

        /// Filter by requester
        #[arg(long)]
        requester: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one request
    Show {
        /// Request ID
        id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the actions a user may take on a request
    Actions {
        /// Request ID
        id: String,

        /// Acting user ID
        #[arg(long)]
        user: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Execute a lifecycle action (accept, reject, confirm, decline,
    /// reschedule, cancel)
    Act {
        /// Request ID
        id: String,

        /// Acting user ID
        #[arg(long)]
        user: String,

        /// Action name
        #[arg(long)]
        action: String,

        /// Free-form notes recorded in the history
        #[arg(long, default_value = "")]
        notes: String,

        /// Proposed date for a reschedule (YYYY-MM-DD)
        #[arg(long)]
        proposed_date: Option<String>,

        /// Proposed start time for a reschedule (HH:MM)
        #[arg(long)]
        proposed_start: Option<String>,

        /// Proposed end time for a reschedule (HH:MM)
        #[arg(long)]
        proposed_end: Option<String>,

        /// Fail unless the stored version matches
        #[arg(long)]
        expected_version: Option<u64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Edit event details while the request is pending review
    Update {
        /// Request ID
        id: String,

        /// Acting user ID
        #[arg(long)]
        user: String,

        /// Replacement title
        #[arg(long)]
        title: Option<String>,

        /// Replacement date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,

        /// Replacement start time (HH:MM)
        #[arg(long)]
        start: Option<String>,

        /// Replacement end time (HH:MM)
        #[arg(long)]
        end: Option<String>,

        /// Replacement notes
        #[arg(long)]
        notes: Option<String>,

        /// Fail unless the stored version matches
        #[arg(long)]
        expected_version: Option<u64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a rejected or cancelled request
    Delete {
        /// Request ID
        id: String,

        /// Acting user ID
        #[arg(long)]
        user: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
