//! Command line front-end for the offer and order workflow.

use anyhow::Context;
use clap::{Parser, Subcommand};
use erp_documents::config::Config;
use erp_documents::document::{DocumentDraft, Offer, Order, Position};
use erp_documents::master_data::{PartyKind, Role};
use erp_documents::service::DocumentService;
use erp_documents::status::{OfferStatus, OrderStatus};
use erp_documents::store::Store;
use erp_documents::types::{CompanyId, Currency, OfferId, OrderId, PartyId, UserId};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file, defaults are used if it does not exist
    #[arg(short, long, default_value = "erp.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error), overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Acting user
    #[arg(short, long, env = "ERP_USER")]
    user: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(subcommand)]
    Company(CompanyCommand),
    #[command(subcommand)]
    Party(PartyCommand),
    /// Give another user a role in a company
    Grant {
        #[arg(long)]
        company: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        role: Role,
    },
    #[command(subcommand)]
    Offer(OfferCommand),
    #[command(subcommand)]
    Order(OrderCommand),
    /// Convert an accepted offer into an order
    Convert {
        #[arg(long)]
        company: String,
        #[arg(long)]
        offer: String,
    },
}

#[derive(Subcommand, Debug)]
enum CompanyCommand {
    Add { name: String },
    List,
}

#[derive(Subcommand, Debug)]
enum PartyCommand {
    Add {
        #[arg(long)]
        company: String,
        #[arg(long)]
        kind: PartyKind,
        #[arg(long)]
        email: Option<String>,
        name: String,
    },
    List {
        #[arg(long)]
        company: String,
        #[arg(long)]
        kind: Option<PartyKind>,
    },
}

#[derive(Subcommand, Debug)]
enum OfferCommand {
    Create {
        #[arg(long)]
        company: String,
        #[arg(long)]
        customer: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "EUR")]
        currency: Currency,
        /// `description:quantity:unit_price[:tax_bp[:discount_bp]]`, repeatable
        #[arg(long = "position", value_parser = parse_position, required = true)]
        positions: Vec<Position>,
    },
    Show {
        #[arg(long)]
        company: String,
        id: String,
    },
    List {
        #[arg(long)]
        company: String,
        #[arg(long)]
        status: Option<OfferStatus>,
    },
    Status {
        #[arg(long)]
        company: String,
        id: String,
        status: OfferStatus,
    },
}

#[derive(Subcommand, Debug)]
enum OrderCommand {
    Show {
        #[arg(long)]
        company: String,
        id: String,
    },
    List {
        #[arg(long)]
        company: String,
        #[arg(long)]
        status: Option<OrderStatus>,
    },
    Status {
        #[arg(long)]
        company: String,
        id: String,
        status: OrderStatus,
    },
}

// Up to four trailing numeric fields are the amounts, everything before them is the
// description, so descriptions may contain `:` as long as they don't end in a number.
fn parse_position(s: &str) -> Result<Position, String> {
    let fields: Vec<&str> = s.split(':').collect();
    let numeric = fields
        .iter()
        .rev()
        .take(4)
        .take_while(|f| f.trim().parse::<u64>().is_ok())
        .count();
    if numeric < 2 || numeric == fields.len() {
        return Err("expected description:quantity:unit_price[:tax_bp[:discount_bp]]".into());
    }

    let split = fields.len() - numeric;
    let description = fields[..split].join(":");
    let numbers = fields[split..]
        .iter()
        .map(|f| f.trim().parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.to_string())?;
    let narrow =
        |v: u64, name: &str| u32::try_from(v).map_err(|_| format!("{name} {v} is too large"));

    let tax = numbers.get(2).copied().unwrap_or(0);
    let discount = numbers.get(3).copied().unwrap_or(0);
    Ok(Position::new(0, description, narrow(numbers[0], "quantity")?, numbers[1])
        .with_tax_rate(narrow(tax, "tax rate")?)
        .with_discount(narrow(discount, "discount")?))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = if args.config.exists() {
        Config::from_file(&args.config)
            .with_context(|| format!("Failed to load {}", args.config.display()))?
    } else {
        Config::default()
    };

    // Initialize tracing, RUST_LOG wins over the command line and config
    use tracing_subscriber::{EnvFilter, fmt};

    let default_directive = args.log_level.clone().unwrap_or(config.logging.level.clone());
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    fmt().with_env_filter(env_filter).with_target(true).init();

    let store = Store::open_path(&config.database.path, config.numbering.clone())
        .with_context(|| format!("Failed to open {}", config.database.path.display()))?;
    tracing::debug!(path = %config.database.path.display(), "database opened");

    let service = DocumentService::new(store.clone());
    let user = UserId::from(args.user);
    run(&service, &user, args.command)?;

    store.flush()?;
    Ok(())
}

fn run(service: &DocumentService, user: &UserId, command: Command) -> anyhow::Result<()> {
    let access = service.access();

    match command {
        Command::Company(CompanyCommand::Add { name }) => {
            let company = service.create_company(&name, user)?;
            println!("{}\t{}", company.id, company.name);
        }
        Command::Company(CompanyCommand::List) => {
            for (company_id, role) in access.companies_of(user)? {
                let company = service.company(&company_id)?;
                let state = if company.active { "" } else { "\t(inactive)" };
                println!("{}\t{}\t{}{}", company.id, company.name, role, state);
            }
        }
        Command::Grant { company, to, role } => {
            let company = CompanyId::from(company);
            access.require(user, &company, Role::Admin)?;
            access.grant(&UserId::from(to), &company, role)?;
        }
        Command::Party(PartyCommand::Add {
            company,
            kind,
            email,
            name,
        }) => {
            let company = CompanyId::from(company);
            access.require(user, &company, Role::Editor)?;
            let party = service.add_party(&company, kind, &name, email)?;
            println!("{}\t{}\t{}", party.id, party.kind, party.name);
        }
        Command::Party(PartyCommand::List { company, kind }) => {
            let company = CompanyId::from(company);
            access.require(user, &company, Role::Viewer)?;
            for party in service.parties(&company, kind)? {
                println!(
                    "{}\t{}\t{}\t{}",
                    party.id,
                    party.kind,
                    party.name,
                    party.email.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Offer(OfferCommand::Create {
            company,
            customer,
            title,
            currency,
            positions,
        }) => {
            let company = CompanyId::from(company);
            access.require(user, &company, Role::Editor)?;
            let draft = positions.into_iter().fold(
                DocumentDraft::new(company)
                    .set_customer(PartyId::from(customer))
                    .set_title(title)
                    .set_currency(currency),
                DocumentDraft::push_position,
            );
            print_offer(&service.create_offer(draft)?)?;
        }
        Command::Offer(OfferCommand::Show { company, id }) => {
            let company = CompanyId::from(company);
            access.require(user, &company, Role::Viewer)?;
            let id = OfferId::from(id);
            print_offer(&service.offer(&company, &id)?)?;
            if let Some(order) = service.order_for_offer(&company, &id)? {
                println!("converted into {order}");
            }
        }
        Command::Offer(OfferCommand::List { company, status }) => {
            let company = CompanyId::from(company);
            access.require(user, &company, Role::Viewer)?;
            for offer in service.offers(&company, status)? {
                println!(
                    "{}\t{}\t{}\t{}",
                    offer.number(),
                    offer.id(),
                    offer.status(),
                    offer.title()
                );
            }
        }
        Command::Offer(OfferCommand::Status {
            company,
            id,
            status,
        }) => {
            let company = CompanyId::from(company);
            access.require(user, &company, Role::Editor)?;
            let offer = service.set_offer_status(&OfferId::from(id), &company, status)?;
            println!("{}\t{}", offer.number(), offer.status());
        }
        Command::Order(OrderCommand::Show { company, id }) => {
            let company = CompanyId::from(company);
            access.require(user, &company, Role::Viewer)?;
            print_order(&service.order(&company, &OrderId::from(id))?)?;
        }
        Command::Order(OrderCommand::List { company, status }) => {
            let company = CompanyId::from(company);
            access.require(user, &company, Role::Viewer)?;
            for order in service.orders(&company, status)? {
                println!(
                    "{}\t{}\t{}\t{}",
                    order.number(),
                    order.id(),
                    order.status(),
                    order.title()
                );
            }
        }
        Command::Order(OrderCommand::Status {
            company,
            id,
            status,
        }) => {
            let company = CompanyId::from(company);
            access.require(user, &company, Role::Editor)?;
            let order = service.set_order_status(&OrderId::from(id), &company, status)?;
            println!("{}\t{}", order.number(), order.status());
        }
        Command::Convert { company, offer } => {
            let company = CompanyId::from(company);
            access.require(user, &company, Role::Editor)?;
            let order_id = service.create_from_offer(&OfferId::from(offer), &company)?;
            println!("{order_id}");
        }
    }
    Ok(())
}

fn print_positions(positions: &[Position]) {
    for p in positions {
        println!(
            "  {:>3}  {:<30} {:>6} x {:>10}  -{}bp  tax {}bp",
            p.line, p.description, p.quantity, p.unit_price, p.discount_bp, p.tax_rate_bp
        );
    }
}

fn print_offer(offer: &Offer) -> anyhow::Result<()> {
    let totals = offer.totals()?;
    println!("{} {} [{}]", offer.number(), offer.title(), offer.status());
    println!(
        "  id {}  customer {}  created {}",
        offer.id(),
        offer.customer_id(),
        offer.created_at()
    );
    print_positions(offer.positions());
    println!(
        "  net {} tax {} gross {} {}",
        totals.net,
        totals.tax,
        totals.gross,
        offer.currency()
    );
    Ok(())
}

fn print_order(order: &Order) -> anyhow::Result<()> {
    let totals = order.totals()?;
    println!("{} {} [{}]", order.number(), order.title(), order.status());
    println!(
        "  id {}  customer {}  created {}",
        order.id(),
        order.customer_id(),
        order.created_at()
    );
    if let Some(offer) = order.offer_id() {
        println!("  from offer {offer}");
    }
    print_positions(order.positions());
    println!(
        "  net {} tax {} gross {} {}",
        totals.net,
        totals.tax,
        totals.gross,
        order.currency()
    );
    Ok(())
}
