use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

use lrts::capacity::CapacityMode;
use lrts::config::{ProgressConfig, SchedulerConfig, WorkerConfig};
use lrts::progress::ProgressServer;
use lrts::proto::progress_service_client::ProgressServiceClient;
use lrts::proto::scheduler_service_client::SchedulerServiceClient;
use lrts::proto::{
    GetJobStatusRequest, JobState, ListJobsRequest, ListWorkersRequest, QueryProgressRequest,
    SubmitJobRequest,
};
use lrts::scheduler::SchedulerServer;
use lrts::shutdown::install_shutdown_handler;
use lrts::worker::WorkerRuntime;

#[derive(Parser, Debug)]
#[command(name = "lrts")]
#[command(version)]
#[command(about = "A long-running task distribution service")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the scheduler
    Scheduler(SchedulerArgs),

    /// Start a worker
    Worker(WorkerArgs),

    /// Start the progress server
    ProgressServer(ProgressArgs),

    /// Job management commands
    Job {
        #[command(flatten)]
        client: ClientArgs,

        #[command(subcommand)]
        command: JobCommands,
    },

    /// Progress query commands
    Progress {
        #[command(flatten)]
        client: ClientArgs,

        #[command(subcommand)]
        command: ProgressCommands,
    },
}

// =============================================================================
// Server Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct SchedulerArgs {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1")]
    address: String,

    /// Port to listen on
    #[arg(long, default_value = "7070")]
    port: u16,

    /// Communication timeout in seconds (also the heartbeat staleness
    /// threshold for worker liveness)
    #[arg(long, default_value = "5")]
    timeout: u64,
}

#[derive(Parser, Debug)]
struct WorkerArgs {
    /// Scheduler address
    #[arg(long, default_value = "127.0.0.1")]
    scheduler_address: String,

    /// Scheduler port
    #[arg(long, default_value = "7070")]
    scheduler_port: u16,

    /// Progress server address
    #[arg(long, default_value = "127.0.0.1")]
    progress_address: String,

    /// Progress server port
    #[arg(long, default_value = "7071")]
    progress_port: u16,

    /// Address to bind the worker's dispatch endpoint on (port 0 picks
    /// an ephemeral port)
    #[arg(long, default_value = "127.0.0.1:0")]
    listen: SocketAddr,

    /// Maximum concurrent jobs: a positive count, or -1 for physical
    /// cores, -2 for logical cores, -3 for physical minus one, -4 for
    /// logical minus one
    #[arg(long, default_value = "-1", allow_hyphen_values = true)]
    max_jobs: i64,

    /// Communication timeout in seconds
    #[arg(long, default_value = "5")]
    timeout: u64,
}

#[derive(Parser, Debug)]
struct ProgressArgs {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1")]
    address: String,

    /// Port to listen on
    #[arg(long, default_value = "7071")]
    port: u16,

    /// Communication timeout in seconds
    #[arg(long, default_value = "5")]
    timeout: u64,
}

// =============================================================================
// Client Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct ClientArgs {
    /// Server address
    #[arg(long, short = 'a', default_value = "http://127.0.0.1:7070")]
    addr: String,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(clap::Subcommand, Debug)]
enum JobCommands {
    /// Submit a new job
    Submit {
        /// The command to execute (e.g., "echo hello")
        command: String,
    },
    /// Get status of a specific job
    Status {
        /// The job ID (UUID)
        job_id: String,
    },
    /// List all jobs
    List,
    /// List registered workers
    Workers,
}

#[derive(clap::Subcommand, Debug)]
enum ProgressCommands {
    /// Get the latest progress recorded for a job
    Get {
        /// The job ID (UUID)
        job_id: String,
    },
}

// =============================================================================
// JSON Output Types
// =============================================================================

#[derive(Serialize)]
struct JobSubmitOutput {
    job_id: String,
    created_at_ms: i64,
}

#[derive(Serialize)]
struct JobStatusOutput {
    job_id: String,
    state: String,
    command: String,
    assigned_worker: String,
    exit_code: Option<i32>,
    output: String,
    error: String,
    created_at_ms: i64,
    completed_at_ms: Option<i64>,
}

#[derive(Serialize)]
struct JobListItem {
    job_id: String,
    state: String,
    command: String,
    assigned_worker: String,
    created_at_ms: i64,
}

#[derive(Serialize)]
struct WorkerListItem {
    worker_id: String,
    capacity: u32,
    active_jobs: u32,
    address: String,
}

#[derive(Serialize)]
struct ProgressOutput {
    job_id: String,
    worker_id: String,
    payload: String,
    updated_at_ms: i64,
}

fn job_state_to_string(state: i32) -> String {
    match JobState::try_from(state) {
        Ok(JobState::Submitted) => "SUBMITTED".to_string(),
        Ok(JobState::Assigned) => "ASSIGNED".to_string(),
        Ok(JobState::Running) => "RUNNING".to_string(),
        Ok(JobState::Completed) => "COMPLETED".to_string(),
        Ok(JobState::Failed) => "FAILED".to_string(),
        _ => "UNKNOWN".to_string(),
    }
}

/// Shorten long commands for table display. Counts characters rather
/// than bytes so multi-byte input cannot split a char boundary.
fn truncate_command(command: &str, max_chars: usize) -> String {
    if command.chars().count() > max_chars {
        let head: String = command.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        command.to_string()
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

// =============================================================================
// Server Roles
// =============================================================================

async fn run_scheduler(args: SchedulerArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let listen_addr: SocketAddr = format!("{}:{}", args.address, args.port).parse()?;
    let config = SchedulerConfig::new(listen_addr, args.timeout);

    tracing::info!(listen_addr = %config.listen_addr, "Starting scheduler");

    let server = SchedulerServer::bind(config).await?;
    let shutdown = install_shutdown_handler();
    server.serve(shutdown).await?;

    Ok(())
}

async fn run_worker(args: WorkerArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let capacity_mode = CapacityMode::from_flag(args.max_jobs)?;
    let config = WorkerConfig {
        listen_addr: args.listen,
        scheduler_addr: format!("{}:{}", args.scheduler_address, args.scheduler_port).parse()?,
        progress_addr: format!("{}:{}", args.progress_address, args.progress_port).parse()?,
        capacity_mode,
        timeout: std::time::Duration::from_secs(args.timeout),
        ..WorkerConfig::default()
    };

    tracing::info!(
        worker_id = %config.worker_id,
        scheduler = %config.scheduler_addr,
        "Starting worker"
    );

    let runtime = WorkerRuntime::bind(config).await?;
    let shutdown = install_shutdown_handler();
    runtime.run(shutdown).await?;

    Ok(())
}

async fn run_progress_server(args: ProgressArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let listen_addr: SocketAddr = format!("{}:{}", args.address, args.port).parse()?;
    let config = ProgressConfig::new(listen_addr, args.timeout);

    tracing::info!(listen_addr = %config.listen_addr, "Starting progress server");

    let server = ProgressServer::bind(config).await?;
    let shutdown = install_shutdown_handler();
    server.serve(shutdown).await?;

    Ok(())
}

// =============================================================================
// Client Command Handlers
// =============================================================================

async fn scheduler_client(
    args: &ClientArgs,
) -> Result<SchedulerServiceClient<tonic::transport::Channel>, Box<dyn std::error::Error>> {
    let channel = tonic::transport::Channel::from_shared(args.addr.clone())?
        .connect()
        .await?;
    Ok(SchedulerServiceClient::new(channel))
}

async fn handle_job_submit(
    client: &mut SchedulerServiceClient<tonic::transport::Channel>,
    cmd: String,
    output_format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match client.submit_job(SubmitJobRequest { command: cmd }).await {
        Ok(response) => {
            let resp = response.into_inner();
            match output_format {
                OutputFormat::Json => {
                    let output = JobSubmitOutput {
                        job_id: resp.job_id,
                        created_at_ms: resp.created_at_ms,
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Table => {
                    println!("Job submitted successfully!");
                    println!("Job ID: {}", resp.job_id);
                }
            }
            Ok(())
        }
        Err(status) => {
            eprintln!("Error: Job submission failed: {}", status.message());
            std::process::exit(1);
        }
    }
}

async fn handle_job_status(
    client: &mut SchedulerServiceClient<tonic::transport::Channel>,
    job_id: String,
    output_format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let response = client
        .get_job_status(GetJobStatusRequest { job_id })
        .await?
        .into_inner();

    match output_format {
        OutputFormat::Json => {
            let output = JobStatusOutput {
                job_id: response.job_id,
                state: job_state_to_string(response.state),
                command: response.command,
                assigned_worker: response.assigned_worker,
                exit_code: response.exit_code,
                output: response.output,
                error: response.error,
                created_at_ms: response.created_at_ms,
                completed_at_ms: response.completed_at_ms,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            println!("Job ID:          {}", response.job_id);
            println!("State:           {}", job_state_to_string(response.state));
            println!("Command:         {}", response.command);
            if !response.assigned_worker.is_empty() {
                println!("Assigned Worker: {}", response.assigned_worker);
            }
            if let Some(exit_code) = response.exit_code {
                println!("Exit Code:       {}", exit_code);
            }
            if !response.output.is_empty() {
                println!("Output:");
                for line in response.output.lines() {
                    println!("  {}", line);
                }
            }
            if !response.error.is_empty() {
                println!("Error:");
                for line in response.error.lines() {
                    println!("  {}", line);
                }
            }
        }
    }
    Ok(())
}

async fn handle_job_list(
    client: &mut SchedulerServiceClient<tonic::transport::Channel>,
    output_format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let response = client.list_jobs(ListJobsRequest {}).await?.into_inner();

    let jobs: Vec<JobListItem> = response
        .jobs
        .into_iter()
        .map(|job| JobListItem {
            job_id: job.job_id,
            state: job_state_to_string(job.state),
            command: job.command,
            assigned_worker: job.assigned_worker,
            created_at_ms: job.created_at_ms,
        })
        .collect();

    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&jobs)?);
        }
        OutputFormat::Table => {
            if jobs.is_empty() {
                println!("No jobs found.");
            } else {
                println!("{:<38} {:<12} {:<38} COMMAND", "JOB ID", "STATE", "WORKER");
                println!("{}", "-".repeat(100));
                for job in &jobs {
                    let worker = if job.assigned_worker.is_empty() {
                        "-"
                    } else {
                        &job.assigned_worker
                    };
                    let cmd_display = truncate_command(&job.command, 20);
                    println!(
                        "{:<38} {:<12} {:<38} {}",
                        job.job_id, job.state, worker, cmd_display
                    );
                }
                println!();
                println!("{} jobs", jobs.len());
            }
        }
    }
    Ok(())
}

async fn handle_worker_list(
    client: &mut SchedulerServiceClient<tonic::transport::Channel>,
    output_format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let response = client
        .list_workers(ListWorkersRequest {})
        .await?
        .into_inner();

    let workers: Vec<WorkerListItem> = response
        .workers
        .into_iter()
        .map(|w| WorkerListItem {
            worker_id: w.worker_id,
            capacity: w.capacity,
            active_jobs: w.active_jobs,
            address: w.address,
        })
        .collect();

    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&workers)?);
        }
        OutputFormat::Table => {
            if workers.is_empty() {
                println!("No workers registered.");
            } else {
                println!(
                    "{:<38} {:<10} {:<12} ADDRESS",
                    "WORKER ID", "CAPACITY", "ACTIVE"
                );
                println!("{}", "-".repeat(85));
                for w in &workers {
                    println!(
                        "{:<38} {:<10} {:<12} {}",
                        w.worker_id, w.capacity, w.active_jobs, w.address
                    );
                }
            }
        }
    }
    Ok(())
}

async fn handle_progress_get(
    args: &ClientArgs,
    job_id: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let channel = tonic::transport::Channel::from_shared(args.addr.clone())?
        .connect()
        .await?;
    let mut client = ProgressServiceClient::new(channel);

    let response = client
        .query_progress(QueryProgressRequest { job_id })
        .await?
        .into_inner();

    match args.output {
        OutputFormat::Json => {
            let output = ProgressOutput {
                job_id: response.job_id,
                worker_id: response.worker_id,
                payload: response.payload,
                updated_at_ms: response.updated_at_ms,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            println!("Job ID:     {}", response.job_id);
            println!("Worker:     {}", response.worker_id);
            println!("Updated at: {}", response.updated_at_ms);
            println!("Progress:   {}", response.payload);
        }
    }
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Commands::Scheduler(scheduler_args) => {
            run_scheduler(scheduler_args).await?;
        }
        Commands::Worker(worker_args) => {
            run_worker(worker_args).await?;
        }
        Commands::ProgressServer(progress_args) => {
            run_progress_server(progress_args).await?;
        }
        Commands::Job { client, command } => {
            let mut grpc_client = scheduler_client(&client).await?;

            match command {
                JobCommands::Submit { command: cmd } => {
                    handle_job_submit(&mut grpc_client, cmd, &client.output).await?;
                }
                JobCommands::Status { job_id } => {
                    handle_job_status(&mut grpc_client, job_id, &client.output).await?;
                }
                JobCommands::List => {
                    handle_job_list(&mut grpc_client, &client.output).await?;
                }
                JobCommands::Workers => {
                    handle_worker_list(&mut grpc_client, &client.output).await?;
                }
            }
        }
        Commands::Progress { client, command } => match command {
            ProgressCommands::Get { job_id } => {
                handle_progress_get(&client, job_id).await?;
            }
        },
    }

    Ok(())
}
