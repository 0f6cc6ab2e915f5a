//! Operator command line.
//!
//! Every command acts as a platform superadmin against the JSON data file named by `--data-file`
//! or `MEDTRIP_DATA_FILE`. Without either, the commands run against an empty in-memory store,
//! which is only useful for trying things out.
//!
//! The data file is locked while a store has it open, so the CLI refuses to run against a file
//! a live server is using. Stop the server first, or make the change through the REST API.

use anyhow::Context;
use clap::{Parser, Subcommand};
use medtrip_core::config::{max_trip_entries_from_env_value, path_from_env_value};
use medtrip_core::ids::{OrganizationId, TripId, UserId, VehicleId};
use medtrip_core::repositories::trips::{TripFilter, TripStatus};
use medtrip_core::types::{NonEmptyText, OrganizationType, Role};
use medtrip_core::{CoreConfig, Principal, TransportService};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "medtrip")]
#[command(about = "MedTrip operator CLI")]
struct Cli {
    /// JSON data file (overrides MEDTRIP_DATA_FILE)
    #[arg(long, global = true)]
    data_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a hospital, fleet or system organization
    CreateOrg {
        name: String,
        /// hospital, fleet or system
        organization_type: String,
    },
    /// List all organizations
    ListOrgs,
    /// Register a vehicle for a fleet
    RegisterVehicle {
        fleet_id: String,
        call_sign: String,
        /// Approve the vehicle straight away
        #[arg(long)]
        approve: bool,
    },
    /// Approve a vehicle that is pending approval
    ApproveVehicle { vehicle_id: String },
    /// Make sure a fleet and a hospital are partnered
    EnsurePartnership { fleet_id: String, hospital_id: String },
    /// Recreate partnerships for accepted collaboration requests that lack one
    ReconcilePartnerships,
    /// List trips
    ListTrips {
        /// onboarded, in_transit, offboarded or cancelled
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        vehicle_id: Option<String>,
    },
    /// Explain whether a user may act on a trip
    CheckAccess {
        trip_id: String,
        user_id: String,
        role: String,
        /// Organization the user acts for
        #[arg(long)]
        org: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("Use 'medtrip --help' for commands");
        return Ok(());
    };

    let data_file = cli
        .data_file
        .or_else(|| path_from_env_value(std::env::var("MEDTRIP_DATA_FILE").ok()));
    let audit_log = path_from_env_value(std::env::var("MEDTRIP_AUDIT_LOG").ok());
    let max_entries =
        max_trip_entries_from_env_value(std::env::var("MEDTRIP_MAX_TRIP_ENTRIES").ok())?;
    let cfg = Arc::new(CoreConfig::new(data_file, audit_log, max_entries)?);
    let service = TransportService::open(cfg).context("failed to open data file")?;
    let operator = Principal::superadmin(UserId::new());

    run(&service, &operator, command)
}

fn run(service: &TransportService, operator: &Principal, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::CreateOrg {
            name,
            organization_type,
        } => {
            let kind: OrganizationType = organization_type.parse()?;
            let org = service.create_organization(operator, NonEmptyText::new(name)?, kind)?;
            println!("Created {} {} ({})", org.organization_type, org.id, org.name);
        }
        Commands::ListOrgs => {
            let orgs = service.list_organizations()?;
            if orgs.is_empty() {
                println!("No organizations found.");
            }
            for org in orgs {
                println!(
                    "{}  {:<8}  {:?}  {}",
                    org.id, org.organization_type, org.status, org.name
                );
            }
        }
        Commands::RegisterVehicle {
            fleet_id,
            call_sign,
            approve,
        } => {
            let fleet: OrganizationId = fleet_id.parse()?;
            let mut vehicle =
                service.register_vehicle(operator, fleet, NonEmptyText::new(call_sign)?)?;
            if approve {
                vehicle = service.approve_vehicle(operator, vehicle.id)?;
            }
            print_json(&vehicle)?;
        }
        Commands::ApproveVehicle { vehicle_id } => {
            let id: VehicleId = vehicle_id.parse()?;
            print_json(&service.approve_vehicle(operator, id)?)?;
        }
        Commands::EnsurePartnership {
            fleet_id,
            hospital_id,
        } => {
            let (partnership, outcome) = service.ensure_active_partnership(
                operator,
                fleet_id.parse()?,
                hospital_id.parse()?,
            )?;
            println!("{outcome:?}: partnership {}", partnership.id);
        }
        Commands::ReconcilePartnerships => {
            print_json(&service.reconcile_partnerships(operator)?)?;
        }
        Commands::ListTrips { status, vehicle_id } => {
            let filter = TripFilter {
                status: status.as_deref().map(parse_status).transpose()?,
                vehicle_id: vehicle_id.map(|v| v.parse()).transpose()?,
            };
            print_json(&service.list_trips(operator, &filter)?)?;
        }
        Commands::CheckAccess {
            trip_id,
            user_id,
            role,
            org,
        } => {
            let trip: TripId = trip_id.parse()?;
            let role: Role = role.parse()?;
            let user: UserId = user_id.parse()?;
            let principal = match org {
                Some(org) => {
                    let org = service.get_organization(org.parse()?)?;
                    Principal::new(user, role, org.id, org.organization_type)
                }
                None => Principal {
                    user_id: user,
                    role,
                    organization_id: None,
                    organization_type: None,
                },
            };
            match service.check_trip_access(&principal, trip)? {
                Some(path) => println!("allowed via {path:?}"),
                None => println!("denied"),
            }
        }
    }
    Ok(())
}

fn parse_status(value: &str) -> anyhow::Result<TripStatus> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .with_context(|| format!("unknown trip status: {value}"))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
