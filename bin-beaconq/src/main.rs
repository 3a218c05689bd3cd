use clap::{Parser, ValueEnum};
use std::net::IpAddr;
use std::process;

use beacon_client::multicast::MulticastClient;
use beacon_client::nameserver::{self, Nameserver};
use beacon_client::resolver::{ResolutionMode, Resolver};
use beacon_types::protocol::types::{
    DomainName, Message, Question, QueryType, RecordType, ResourceRecord,
};

fn print_section(heading: &str, rrs: &[ResourceRecord]) {
    if rrs.is_empty() {
        return;
    }

    println!("\n;; {heading}");
    for rr in rrs {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            rr.name,
            rr.ttl,
            rr.rclass,
            rr.rtype(),
            rr.rtype_with_data
        );
    }
}

fn print_message(message: &Message) {
    println!(";; rcode {:?}", message.header.rcode);
    print_section("ANSWER", &message.answers);
    print_section("AUTHORITY", &message.authority);
    print_section("ADDITIONAL", &message.additional);
}

#[derive(Copy, Clone, Eq, PartialEq, ValueEnum)]
enum Preset {
    System,
    Root,
    Cloudflare,
    Google,
}

// the doc comments for this struct turn into the CLI help text
#[derive(Parser)]
/// DNS and multicast DNS lookup utility
struct Args {
    /// Domain name to resolve
    domain: DomainName,

    /// Query type to resolve
    #[clap(default_value_t = QueryType::Record(RecordType::A))]
    qtype: QueryType,

    /// Nameserver address, can be specified more than once; overrides
    /// the preset
    #[clap(short, long)]
    nameserver: Vec<IpAddr>,

    /// Which canned nameserver set to start from
    #[clap(long, value_enum, default_value = "system")]
    preset: Preset,

    /// Tunnel queries over HTTPS, falling back to UDP
    #[clap(long, action(clap::ArgAction::SetTrue))]
    secure: bool,

    /// Query the link-local multicast group instead of unicast
    /// nameservers
    #[clap(short, long, action(clap::ArgAction::SetTrue))]
    mdns: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let question = Question::new(args.domain.clone(), args.qtype);

    let response = if args.mdns {
        resolve_mdns(question).await
    } else {
        resolve_unicast(&args, question).await
    };

    match response {
        Some(message) => print_message(&message),
        None => {
            eprintln!("no answer");
            process::exit(1);
        }
    }
}

async fn resolve_unicast(args: &Args, question: Question) -> Option<Message> {
    let nameservers = if args.nameserver.is_empty() {
        match args.preset {
            Preset::System => nameserver::system(),
            Preset::Root => nameserver::root_hints(),
            Preset::Cloudflare => nameserver::cloudflare(),
            Preset::Google => nameserver::google(),
        }
    } else {
        args.nameserver.iter().copied().map(Nameserver::new).collect()
    };

    let mode = if args.secure {
        ResolutionMode::SecureWithFallback
    } else {
        ResolutionMode::InsecureOnly
    };

    Resolver::with_nameservers(nameservers, mode)
        .resolve_query(&question)
        .await
}

async fn resolve_mdns(question: Question) -> Option<Message> {
    let client = MulticastClient::new();
    if let Err(error) = client.start() {
        eprintln!("could not start multicast client: {error}");
        process::exit(1);
    }

    let response = client.resolve_query(question).await;
    client.stop();
    response
}
