use std::env;
use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use xpert_client::CourseContext;
use xpert_client::HttpChatGateway;
use xpert_client::MessageDispatcher;
use xpert_client::TracingTelemetry;
use xpert_core::access::evaluate_widget_access;
use xpert_core::access::AccessInputs;
use xpert_core::access::CourseMeta;
use xpert_core::access::LearnerContext;
use xpert_core::access::WidgetAccess;
use xpert_core::config::Config;
use xpert_core::experiments::ExperimentResolver;
use xpert_core::experiments::StaticDecisionProvider;
use xpert_core::panel::derive_panel;
use xpert_core::panel::PanelInputs;
use xpert_core::panel::PanelView;
use xpert_core::telemetry::LaunchSource;
use xpert_core::upgrade::CourseUpgrade;
use xpert_core::upgrade::UpgradeOffer;
use xpert_core::ConversationState;
use xpert_core::ConversationStore;
use xpert_core::Message;
use xpert_core::Role;

const DISCLOSURE: &str = "Xpert is an AI assistant. Messages are sent to a third-party model \
                          provider; do not share personal information.";

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn Error>> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_help();
        return Ok(());
    };

    match command.as_str() {
        "--help" | "-h" | "help" => {
            print_help();
            Ok(())
        }
        "--version" | "-V" | "version" => {
            println!("xpert {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "chat" => {
            let session_args = parse_session_args(args.collect::<Vec<_>>())?;
            run_chat(session_args).await
        }
        "summary" => {
            let session_args = parse_session_args(args.collect::<Vec<_>>())?;
            run_summary(session_args).await
        }
        _ => {
            print_help();
            Err(format!("unknown command: {command}").into())
        }
    }
}

#[derive(Debug, Default)]
struct SessionArgs {
    config: Option<PathBuf>,
    course_id: String,
    unit_id: Option<String>,
    user_id: Option<String>,
    enrollment_mode: Option<String>,
    is_staff: bool,
    upgrade_url: Option<String>,
    verified_upgrade_url: Option<String>,
}

fn parse_session_args(args: Vec<String>) -> Result<SessionArgs, Box<dyn Error>> {
    let mut parsed = SessionArgs::default();
    let mut course_id = None;
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        if flag == "--staff" {
            parsed.is_staff = true;
            i += 1;
            continue;
        }

        let Some(value) = args.get(i + 1).cloned() else {
            return Err(format!("{flag} requires a value").into());
        };
        match flag {
            "--config" => parsed.config = Some(PathBuf::from(value)),
            "--course" => course_id = Some(value),
            "--unit" => parsed.unit_id = Some(value),
            "--user" => parsed.user_id = Some(value),
            "--mode" => parsed.enrollment_mode = Some(value),
            "--upgrade-url" => parsed.upgrade_url = Some(value),
            "--verified-upgrade-url" => parsed.verified_upgrade_url = Some(value),
            other => return Err(format!("unsupported argument: {other}").into()),
        }
        i += 2;
    }

    let Some(course_id) = course_id else {
        return Err("--course is required".into());
    };
    parsed.course_id = course_id;
    Ok(parsed)
}

fn load_config(path: Option<&PathBuf>) -> Result<Config, Box<dyn Error>> {
    let path = match path {
        Some(path) => path.clone(),
        None => dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("xpert")
            .join("config.toml"),
    };
    debug!(path = %path.display(), exists = path.exists(), "loading config");
    let mut config = Config::load(&path)?;
    config.apply_env_overrides(|key| env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

fn build_resolver(config: &Config) -> ExperimentResolver {
    if config.experiments.sdk_key.is_none() {
        return ExperimentResolver::unconfigured();
    }
    let provider = StaticDecisionProvider::new(config.experiments.decisions.clone());
    ExperimentResolver::new(Box::new(provider))
}

struct Session {
    config: Config,
    resolver: ExperimentResolver,
    dispatcher: MessageDispatcher,
}

async fn open_session(args: &SessionArgs) -> Result<Session, Box<dyn Error>> {
    let config = load_config(args.config.as_ref())?;
    let resolver = build_resolver(&config);
    let gateway = HttpChatGateway::from_config(&config.chat)?;

    let mut dispatcher = MessageDispatcher::new(
        Arc::new(ConversationStore::default()),
        Arc::new(gateway),
        Arc::new(TracingTelemetry),
    );
    if let Some(user_id) = &args.user_id {
        dispatcher = dispatcher.with_user_id(user_id.clone());
    }

    debug!(
        course_id = %args.course_id,
        base_url = %config.chat.base_url,
        v2_endpoint = config.chat.v2_endpoint,
        "opening session"
    );
    dispatcher.sync_experiments(&resolver);
    dispatcher.refresh_summary(&args.course_id).await;
    dispatcher.load_message_history(&args.course_id).await;

    Ok(Session {
        config,
        resolver,
        dispatcher,
    })
}

fn widget_access(session: &Session, args: &SessionArgs, state: &ConversationState) -> WidgetAccess {
    let user_id = args.user_id.as_deref().unwrap_or_default();
    let trial_length = session.resolver.trial_length_decision(user_id);
    let learner = LearnerContext {
        is_staff: args.is_staff,
        enrollment_mode: args.enrollment_mode.clone(),
        in_active_exam: false,
    };
    let course = CourseMeta {
        learning_assistant_enabled: Some(state.is_enabled),
        ..CourseMeta::default()
    };
    evaluate_widget_access(AccessInputs {
        learner: &learner,
        course: &course,
        audit_feature_enabled: session.config.audit.enabled,
        trial_length: &trial_length,
        audit_trial: state.audit_trial.as_ref(),
        now: Utc::now(),
    })
}

fn course_upgrade(args: &SessionArgs, state: &ConversationState, eligible: bool) -> CourseUpgrade {
    let offer = UpgradeOffer {
        offer_upgrade_url: args.upgrade_url.clone(),
        verified_mode_upgrade_url: args.verified_upgrade_url.clone(),
        ..UpgradeOffer::default()
    };
    CourseUpgrade::evaluate(
        eligible,
        &offer,
        state.audit_trial.as_ref(),
        state.audit_trial_length_days,
        Utc::now(),
    )
}

async fn run_summary(args: SessionArgs) -> Result<(), Box<dyn Error>> {
    let session = open_session(&args).await?;
    let state = session.dispatcher.store().snapshot();
    let access = widget_access(&session, &args, &state);

    println!("conversation: {}", state.conversation_id);
    println!("enabled: {}", state.is_enabled);
    println!("messages: {}", state.message_list.len());
    println!("disclosure acknowledged: {}", state.disclosure_acknowledged);
    match access {
        WidgetAccess::Hidden(reason) => println!("widget: hidden ({})", reason.label()),
        WidgetAccess::Visible {
            is_upgrade_eligible,
            has_active_audit_trial,
        } => {
            println!("widget: visible");
            println!("upgrade eligible: {is_upgrade_eligible}");
            println!("active audit trial: {has_active_audit_trial}");
            let upgrade = course_upgrade(&args, &state, is_upgrade_eligible);
            if let Some(days) = upgrade.audit_trial_days_remaining {
                println!("trial days remaining: {days}");
            }
            if let Some(text) = upgrade.days_remaining_banner().text() {
                println!("{text}");
            }
        }
    }
    if state.api_error {
        println!("last request failed");
    }
    Ok(())
}

async fn run_chat(args: SessionArgs) -> Result<(), Box<dyn Error>> {
    let session = open_session(&args).await?;
    let dispatcher = &session.dispatcher;

    let state = dispatcher.store().snapshot();
    let is_upgrade_eligible = match widget_access(&session, &args, &state) {
        WidgetAccess::Hidden(reason) => {
            println!("assistant unavailable: {}", reason.label());
            return Ok(());
        }
        WidgetAccess::Visible {
            is_upgrade_eligible,
            ..
        } => is_upgrade_eligible,
    };

    let ctx = CourseContext {
        course_id: args.course_id.clone(),
        unit_id: args.unit_id.clone(),
        is_upgrade_eligible,
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    dispatcher.set_sidebar_open(true, LaunchSource::Toggle);
    let mut printed = 0;
    loop {
        let state = dispatcher.store().snapshot();
        let panel = derive_panel(PanelInputs::from_state(&state, is_upgrade_eligible, Utc::now()));
        match panel {
            PanelView::Closed => break,
            PanelView::UpgradePanel => {
                println!("Your free trial has ended.");
                if let Some(url) = course_upgrade(&args, &state, is_upgrade_eligible).upgrade_url {
                    println!("Upgrade to keep using Xpert: {url}");
                }
                break;
            }
            PanelView::DisclosurePending => {
                println!("{DISCLOSURE}");
                prompt("accept? [y/N]: ")?;
                let Some(line) = lines.next_line().await? else {
                    break;
                };
                if !matches!(line.trim(), "y" | "Y" | "yes" | "YES") {
                    break;
                }
                dispatcher.acknowledge_disclosure(true);
            }
            PanelView::ChatOpen => {
                if printed == 0 {
                    if let Some(text) = course_upgrade(&args, &state, is_upgrade_eligible)
                        .days_remaining_banner()
                        .text()
                    {
                        println!("{text}");
                    }
                }
                printed = print_new_messages(&state, printed);
                if state.api_error {
                    println!("! something went wrong, try again or /clear");
                }

                prompt("> ")?;
                let Some(line) = lines.next_line().await? else {
                    break;
                };
                match line.trim() {
                    "" => {}
                    "/quit" => break,
                    "/clear" => {
                        dispatcher.clear_conversation();
                        printed = 0;
                    }
                    "/summary" => {
                        let before = dispatcher.store().read(|state| state.message_list.clone());
                        dispatcher.refresh_summary(&ctx.course_id).await;
                        printed = dispatcher.store().read(|state| {
                            printed_after_refresh(&before, &state.message_list, printed)
                        });
                    }
                    _ => {
                        dispatcher.update_draft(line);
                        // The learner's own line is already on screen.
                        if dispatcher.submit_draft(&ctx, &session.resolver).await {
                            printed += 1;
                        }
                    }
                }
            }
        }
    }
    dispatcher.set_sidebar_open(false, LaunchSource::Toggle);
    debug!(
        conversation_id = %dispatcher.store().read(|state| state.conversation_id),
        "chat session closed"
    );
    Ok(())
}

/// Stored history can replace the list outright; reprint it from the top then.
fn printed_after_refresh(before: &[Message], after: &[Message], printed: usize) -> usize {
    if after.starts_with(before) {
        printed
    } else {
        0
    }
}

fn print_new_messages(state: &ConversationState, printed: usize) -> usize {
    let printed = printed.min(state.message_list.len());
    for message in &state.message_list[printed..] {
        let speaker = match message.role {
            Role::User => "you",
            Role::Assistant => "xpert",
        };
        println!("{speaker}: {}", message.content);
    }
    state.message_list.len()
}

fn prompt(text: &str) -> std::io::Result<()> {
    print!("{text}");
    std::io::stdout().flush()
}

fn print_help() {
    println!("xpert {}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  xpert chat --course ID [--unit ID] [--user ID] [--mode MODE] [--staff]");
    println!("             [--upgrade-url URL] [--verified-upgrade-url URL] [--config PATH]");
    println!("  xpert summary --course ID [--user ID] [--mode MODE] [--staff] [--config PATH]");
    println!("  xpert --help");
    println!("  xpert --version");
    println!();
    println!("In chat: /clear resets the conversation, /summary refreshes, /quit exits.");
}
