use btcrawl::{router, CrawlEvent, Crawler, DEFAULT_CAPACITY, DEFAULT_PORT};
use clap::Parser;
use std::{
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    time::Duration,
};
use tokio::{net::UdpSocket, time};

#[derive(Parser)]
#[command(name = "crawl")]
#[command(about = "Print the info-hashes seen on the bittorrent mainline DHT")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Maximum number of contacts in the routing table
    #[arg(short, long, default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,
    /// Bootstrap router (host:port), can be repeated
    #[arg(short, long)]
    bootstrap: Vec<String>,
    /// Stop after this many seconds
    #[arg(long)]
    seconds: Option<u64>,
    /// Also print the hashes that were only asked about
    #[arg(long)]
    observed: bool,
}

#[tokio::main]
async fn main() {
    pretty_env_logger::init();

    let args = Args::parse();

    let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, args.port));
    let socket = UdpSocket::bind(addr).await.unwrap();

    let bootstrap = if args.bootstrap.is_empty() {
        router::DEFAULT_ROUTERS.iter().map(|r| r.to_string()).collect()
    } else {
        args.bootstrap
    };

    let (crawler, mut events) = Crawler::builder()
        .set_bootstrap(bootstrap)
        .set_capacity(args.capacity)
        .start(socket)
        .unwrap();

    println!("crawling on {}", crawler.local_addr().await.unwrap());

    if let Some(seconds) = args.seconds {
        let crawler = crawler.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_secs(seconds)).await;
            crawler.shutdown().unwrap_or(());
        });
    }

    let mut confirmed = 0;

    while let Some(event) = events.recv().await {
        match event {
            CrawlEvent::InfoHashConfirmed { info_hash, addr } => {
                confirmed += 1;
                println!("{} {}", info_hash, addr);
            }
            CrawlEvent::InfoHashObserved(info_hash) if args.observed => {
                println!("{} ?", info_hash);
            }
            CrawlEvent::InfoHashObserved(_) | CrawlEvent::NodesDiscovered(_) => (),
        }
    }

    println!("{} announces seen", confirmed);
}
