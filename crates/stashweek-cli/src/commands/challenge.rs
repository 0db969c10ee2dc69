//! Savings challenge commands for CLI.

use chrono::{Local, NaiveDate};
use clap::{Args, Subcommand};
use stashweek_core::{
    find_template, get_progress, AllocationParams, Challenge, ChallengeDb, ChallengeStatus, Config,
    CoreError, DepositRequest, DepositStatus, Direction, NewChallenge, SchedulePreview, Transition,
};

/// Schedule options shared by `create` and `preview`.
#[derive(Args)]
pub struct PlanArgs {
    /// Catalog template key (see `catalog list`)
    #[arg(long, conflicts_with_all = ["start", "step"])]
    template: Option<String>,
    /// Target amount in minor units (template mode)
    #[arg(long)]
    target: Option<i64>,
    /// First progression amount in minor units (custom mode)
    #[arg(long, requires = "step")]
    start: Option<i64>,
    /// Per-week progression step in minor units (custom mode)
    #[arg(long, requires = "start", allow_hyphen_values = true)]
    step: Option<i64>,
    /// Number of weeks (default from config)
    #[arg(long)]
    weeks: Option<u32>,
    /// standard (front-loaded) or inverse (back-loaded)
    #[arg(long)]
    direction: Option<Direction>,
    /// First day of week 1 (YYYY-MM-DD, default today)
    #[arg(long)]
    start_date: Option<NaiveDate>,
}

#[derive(Subcommand)]
pub enum ChallengeAction {
    /// Create a new challenge
    Create {
        #[command(flatten)]
        plan: PlanArgs,
        /// Challenge title
        #[arg(long)]
        title: Option<String>,
        /// Icon name
        #[arg(long)]
        icon: Option<String>,
        /// External account to mirror paid deposits into
        #[arg(long)]
        account: Option<String>,
    },
    /// Show the schedule a plan would produce without saving it
    Preview {
        #[command(flatten)]
        plan: PlanArgs,
    },
    /// List challenges
    List {
        /// Only challenges in this status (active, paused, completed, cancelled)
        #[arg(long)]
        status: Option<ChallengeStatus>,
    },
    /// Get challenge details
    Get {
        /// Challenge ID
        id: String,
    },
    /// Week-by-week schedule with due dates and ledger state
    Schedule {
        /// Challenge ID
        id: String,
    },
    /// Record a deposit for one week
    Deposit {
        /// Challenge ID
        id: String,
        /// Week number (1-based)
        #[arg(long)]
        week: u32,
        /// Amount in minor units (default: scheduled amount)
        #[arg(long)]
        amount: Option<i64>,
        /// paid, pending or skipped
        #[arg(long, default_value = "paid")]
        status: DepositStatus,
        /// Date the deposit was made (default today)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Request a linked transaction (default from config)
        #[arg(long, overrides_with = "no_link")]
        link: bool,
        /// Do not request a linked transaction
        #[arg(long)]
        no_link: bool,
    },
    /// Toggle between active and paused
    Pause {
        /// Challenge ID
        id: String,
    },
    /// Cancel a challenge (terminal)
    Cancel {
        /// Challenge ID
        id: String,
    },
    /// Progress report
    Progress {
        /// Challenge ID
        id: String,
        /// Evaluate as of this date (default today)
        #[arg(long)]
        now: Option<NaiveDate>,
    },
    /// Delete a challenge and its ledger
    Delete {
        /// Challenge ID
        id: String,
    },
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn build_new_challenge(
    plan: PlanArgs,
    config: &Config,
    title: Option<String>,
    icon: Option<String>,
    account: Option<String>,
) -> Result<NewChallenge, Box<dyn std::error::Error>> {
    let start_date = plan.start_date.unwrap_or_else(today);

    let mut new = if let Some(key) = plan.template.as_deref() {
        let template = find_template(key).ok_or_else(|| format!("unknown template: {key}"))?;
        let mut new = NewChallenge::from_template(template, start_date);
        new.params = config.engine.template_params();
        if let Some(target) = plan.target {
            new.target_amount = Some(target);
        }
        new
    } else if let (Some(start_amount), Some(step_amount)) = (plan.start, plan.step) {
        NewChallenge {
            id: None,
            title: "Custom challenge".into(),
            icon: "piggy-bank".into(),
            direction: config.engine.default_direction,
            total_weeks: config.engine.default_weeks,
            target_amount: plan.target,
            params: AllocationParams::Custom {
                start_amount,
                step_amount,
            },
            start_date,
            linked_account_ref: None,
        }
    } else if let Some(target) = plan.target {
        NewChallenge {
            id: None,
            title: "Savings challenge".into(),
            icon: "piggy-bank".into(),
            direction: config.engine.default_direction,
            total_weeks: config.engine.default_weeks,
            target_amount: Some(target),
            params: config.engine.template_params(),
            start_date,
            linked_account_ref: None,
        }
    } else {
        return Err("one of --template, --target or --start/--step is required".into());
    };

    if let Some(weeks) = plan.weeks {
        new.total_weeks = weeks;
    }
    if let Some(direction) = plan.direction {
        new.direction = direction;
    }
    if let Some(title) = title {
        new.title = title;
    }
    if let Some(icon) = icon {
        new.icon = icon;
    }
    new.linked_account_ref = account;
    Ok(new)
}

fn print_transition(transition: &Transition) -> Result<(), Box<dyn std::error::Error>> {
    let output = serde_json::json!({
        "challenge": transition.challenge,
        "events": transition.events,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn schedule_rows(challenge: &Challenge, config: &Config) -> Vec<serde_json::Value> {
    (1..=challenge.total_weeks())
        .map(|week| {
            let scheduled = challenge.scheduled_amount(week).unwrap_or_default();
            let deposit = challenge.deposit(week);
            serde_json::json!({
                "week": week,
                "due_date": challenge.due_date(week),
                "scheduled_amount": scheduled,
                "scheduled": config.display.format_amount(scheduled),
                "status": deposit.map(|d| d.status),
                "deposited_amount": deposit.map(|d| d.amount),
            })
        })
        .collect()
}

pub fn run(action: ChallengeAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();

    match action {
        ChallengeAction::Create {
            plan,
            title,
            icon,
            account,
        } => {
            let new = build_new_challenge(plan, &config, title, icon, account)?;
            let transition = Challenge::create(new)?;
            let challenge = &transition.challenge;
            let db = ChallengeDb::open()?;
            db.insert(challenge)?;
            tracing::debug!(id = challenge.id(), weeks = challenge.total_weeks(), "challenge stored");
            eprintln!("Challenge created: {}", challenge.id());
            print_transition(&transition)?;
        }
        ChallengeAction::Preview { plan } => {
            let new = build_new_challenge(plan, &config, None, None, None)?;
            let challenge = Challenge::create(new.clone())?.challenge;
            let preview = match new.params {
                AllocationParams::Custom {
                    start_amount,
                    step_amount,
                } => SchedulePreview::for_progression(
                    new.total_weeks,
                    new.direction,
                    start_amount,
                    step_amount,
                )?,
                AllocationParams::Template { .. } => {
                    SchedulePreview::from_schedule(challenge.weekly_amounts())
                }
            };
            let weekly_amounts = challenge.weekly_amounts();
            let output = serde_json::json!({
                "preview": preview,
                "target": config.display.format_amount(preview.target_total),
                "weekly_amounts": weekly_amounts,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        ChallengeAction::List { status } => {
            let db = ChallengeDb::open()?;
            let challenges = match status {
                Some(status) => db.list_by_status(status)?,
                None => db.list()?,
            };
            println!("{}", serde_json::to_string_pretty(&challenges)?);
        }
        ChallengeAction::Get { id } => {
            let db = ChallengeDb::open()?;
            let challenge = db.require(&id)?;
            println!("{}", serde_json::to_string_pretty(&challenge)?);
        }
        ChallengeAction::Schedule { id } => {
            let db = ChallengeDb::open()?;
            let challenge = db.require(&id)?;
            let rows = schedule_rows(&challenge, &config);
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        ChallengeAction::Deposit {
            id,
            week,
            amount,
            status,
            date,
            link,
            no_link,
        } => {
            let db = ChallengeDb::open()?;
            let link_transaction = if no_link {
                false
            } else {
                link || config.deposits.link_by_default
            };
            let result = db.update_with(&id, |challenge| {
                let amount = match amount {
                    Some(amount) => amount,
                    None => challenge.scheduled_amount(week).unwrap_or_default(),
                };
                challenge.record_deposit(DepositRequest {
                    week,
                    amount,
                    status,
                    date: date.unwrap_or_else(today),
                    link_transaction,
                })
            });
            match result {
                Ok(transition) => print_transition(&transition)?,
                Err(CoreError::Challenge(e)) if e.is_idempotent_replay() => {
                    tracing::debug!(%id, week, "duplicate deposit ignored");
                    eprintln!("Week {week} already paid; nothing changed");
                    println!("{}", serde_json::to_string_pretty(&db.require(&id)?)?);
                }
                Err(e) => return Err(e.into()),
            }
        }
        ChallengeAction::Pause { id } => {
            let db = ChallengeDb::open()?;
            print_transition(&db.update_with(&id, Challenge::toggle_pause)?)?;
        }
        ChallengeAction::Cancel { id } => {
            let db = ChallengeDb::open()?;
            print_transition(&db.update_with(&id, Challenge::cancel)?)?;
        }
        ChallengeAction::Progress { id, now } => {
            let db = ChallengeDb::open()?;
            let challenge = db.require(&id)?;
            let report = get_progress(&challenge, now.unwrap_or_else(today));
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        ChallengeAction::Delete { id } => {
            let db = ChallengeDb::open()?;
            if !db.delete(&id)? {
                return Err(format!("challenge not found: {id}").into());
            }
            println!("Challenge deleted: {id}");
        }
    }
    Ok(())
}
