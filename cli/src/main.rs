use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use gates::{Axis, GateError, GateTree, Transform, TransformType};
use serde_json::Value;
use session::{ApiError, GateEvent, GateField, GateSession, HttpGateApi, LaunchParams, SessionConfig, SessionError};
use tokio::sync::broadcast;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Session(#[from] SessionError),
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("{0}")]
    Gate(#[from] GateError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("invalid transform: {}", .0.join("; "))]
    InvalidTransform(Vec<String>),
    #[error("timed out after {0}s waiting for the plot to refresh")]
    Timeout(u64),
    #[error("event stream closed")]
    EventsClosed,
}

#[derive(Parser, Debug)]
#[command(name = "flowgate", about = "Inspect and edit flowgate gate trees")]
struct Cli {
    #[arg(long, env = "FLOWGATE_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "FLOWGATE_REQUEST_TIMEOUT_SECS")]
    request_timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a gate tree and print its hierarchy.
    Tree(TreeArgs),
    /// Load a gate tree, apply edits to the root gate, and save it.
    Save(SaveArgs),
    /// Check transform parameters without contacting the server.
    Validate(ValidateArgs),
}

#[derive(Args, Debug)]
struct LaunchArgs {
    /// Experiment file id.
    #[arg(long, env = "FLOWGATE_EXP_FILE_ID")]
    exp_file_id: Option<String>,

    #[arg(long, env = "FLOWGATE_GATE_EDIT_SESSION", default_value = "")]
    gate_edit_session: String,

    /// Ignore any saved tree and start from a default gate.
    #[arg(long)]
    new_gate: bool,

    /// Launch query string (`expFileId=..&gateEditSession=..&newGate=1`);
    /// takes precedence over the individual flags.
    #[arg(long)]
    query: Option<String>,
}

impl LaunchArgs {
    fn params(&self) -> Result<LaunchParams, CliError> {
        if let Some(query) = &self.query {
            return Ok(LaunchParams::from_query(query)?);
        }
        let exp_file_id = self.exp_file_id.clone().unwrap_or_default();
        if exp_file_id.is_empty() {
            return Err(SessionError::Config("pass --exp-file-id, --query, or set FLOWGATE_EXP_FILE_ID".into()).into());
        }
        Ok(LaunchParams { exp_file_id, gate_edit_session: self.gate_edit_session.clone(), new_gate: self.new_gate })
    }
}

#[derive(Args, Debug)]
struct TreeArgs {
    #[command(flatten)]
    launch: LaunchArgs,

    /// Print the wire JSON instead of the outline.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct SaveArgs {
    #[command(flatten)]
    launch: LaunchArgs,

    /// Rename the root gate; an empty name reverts to the automatic one.
    #[arg(long)]
    rename: Option<String>,

    /// Set the root gate's axis parameters.
    #[arg(long, num_args = 2, value_names = ["X", "Y"])]
    parameters: Option<Vec<String>>,

    /// Seconds to wait for the server to re-render the plot.
    #[arg(long, default_value_t = 15)]
    wait_secs: u64,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum TypeArg {
    None,
    Linear,
    Log,
    Logicle,
    Predefined,
}

impl From<TypeArg> for TransformType {
    fn from(value: TypeArg) -> Self {
        match value {
            TypeArg::None => Self::None,
            TypeArg::Linear => Self::Linear,
            TypeArg::Log => Self::Log,
            TypeArg::Logicle => Self::Logicle,
            TypeArg::Predefined => Self::Predefined,
        }
    }
}

#[derive(Args, Debug)]
struct ValidateArgs {
    #[arg(long = "type", value_enum)]
    transform_type: TypeArg,
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    a: f64,
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    t: f64,
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    m: f64,
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    w: f64,
    #[arg(long, default_value = "")]
    predefined_name: String,
}

impl ValidateArgs {
    fn transform(&self) -> Transform {
        Transform {
            transform_type: self.transform_type.into(),
            a: self.a,
            t: self.t,
            m: self.m,
            w: self.w,
            predefined_name: self.predefined_name.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = SessionConfig::from_env();
    if let Some(base_url) = &cli.base_url {
        config.base_url = SessionConfig::new(base_url).base_url;
    }
    if let Some(secs) = cli.request_timeout_secs {
        config.timeouts.request_secs = secs;
    }

    match cli.command {
        Command::Tree(args) => run_tree(config, args).await,
        Command::Save(args) => run_save(config, args).await,
        Command::Validate(args) => run_validate(&args),
    }
}

async fn open_session(config: SessionConfig, launch: &LaunchArgs) -> Result<GateSession, CliError> {
    let params = launch.params()?;
    let api = HttpGateApi::new(&config)?;
    let mut session = GateSession::new(Arc::new(api), config);
    session.load_gate(&params).await?;
    Ok(session)
}

async fn run_tree(config: SessionConfig, args: TreeArgs) -> Result<(), CliError> {
    let session = open_session(config, &args.launch).await?;
    let tree = session.tree()?;
    if args.json {
        print_json(&tree.to_value()?)?;
    } else {
        print!("{}", render_tree(tree));
    }
    Ok(())
}

async fn run_save(config: SessionConfig, args: SaveArgs) -> Result<(), CliError> {
    let mut session = open_session(config, &args.launch).await?;
    let mut events = session.subscribe();

    if let Some(name) = &args.rename {
        session.rename_current_gate(name)?;
    }
    if let Some([x, y]) = args.parameters.as_deref() {
        session.set_current_parameters(x, y)?;
    }
    if args.rename.is_none() && args.parameters.is_none() {
        // No edits: resave the tree as loaded.
        session.notify_current_gate_updated(GateEvent::FieldChanged(GateField::Children));
    }

    let (plot_key, version) = wait_for_plot(&mut events, args.wait_secs).await?;
    info!(%plot_key, version, "gate tree saved");
    println!("{}", session.plot_url(&plot_key, version));
    Ok(())
}

fn run_validate(args: &ValidateArgs) -> Result<(), CliError> {
    let errors = args.transform().validate();
    if !errors.is_empty() {
        return Err(CliError::InvalidTransform(errors));
    }
    println!("ok");
    Ok(())
}

/// Wait for the first plot refresh, then keep draining until the pipeline
/// goes quiet so the newest plot wins.
async fn wait_for_plot(
    events: &mut broadcast::Receiver<GateEvent>,
    wait_secs: u64,
) -> Result<(String, u64), CliError> {
    let mut latest = None;
    let mut window = Duration::from_secs(wait_secs);
    loop {
        match tokio::time::timeout(window, events.recv()).await {
            Ok(Ok(GateEvent::PlotRefreshed { plot_key, version })) => {
                latest = Some((plot_key, version));
                window = Duration::from_millis(500);
            }
            Ok(Ok(event)) => debug!(?event, "ignoring event"),
            Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => debug!(skipped, "event stream lagged"),
            Ok(Err(broadcast::error::RecvError::Closed)) => return latest.ok_or(CliError::EventsClosed),
            Err(_) => return latest.ok_or(CliError::Timeout(wait_secs)),
        }
    }
}

fn render_tree(tree: &GateTree) -> String {
    let mut out = String::new();
    for id in tree.ids() {
        let Some(gate) = tree.gate(id) else {
            continue;
        };
        let indent = "  ".repeat(tree.depth(id));
        out.push_str(&format!(
            "{indent}{} [{} {} / {} {}] {} points, plot {}\n",
            gate.name,
            gate.x,
            gate.transform(Axis::X).transform_type.as_str(),
            gate.y,
            gate.transform(Axis::Y).transform_type.as_str(),
            gate.points.len(),
            gate.plot_key,
        ));
    }
    out
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
