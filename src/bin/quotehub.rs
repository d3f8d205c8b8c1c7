use quotehub::config::Config;
use quotehub::normalizer::{DilutionPolicy, ReferencePolicy, DEFAULT_DILUTION_FACTOR};
use quotehub::publisher::GitPublisher;
use quotehub::record_provider::QuoteRecordProvider;
use quotehub::scrapers::base::MarketScraper;
use quotehub::scrapers::yahoo::YahooScraper;
use quotehub::services::quote_service::QuoteService;

use clap::{App, Arg, SubCommand};
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;

fn publish_message(symbol: &str) -> String {
    format!("Update {} snapshot", symbol)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init();

    // 创建基本的命令行应用
    let app = App::new("QuoteHub")
        .version("1.0.0")
        .author("QuoteHub Team")
        .about("Single-symbol market snapshot generator");

    // 添加子命令
    let app = app
        .subcommand(
            SubCommand::with_name("snapshot")
                .about("Capture a snapshot and write it to the output file")
                .arg(
                    Arg::with_name("symbol")
                        .short('s')
                        .long("symbol")
                        .value_name("SYMBOL")
                        .help("Equity symbol to capture")
                        .takes_value(true)
                        .default_value("BMNR"),
                )
                .arg(
                    Arg::with_name("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .help("Output JSON file")
                        .takes_value(true)
                        .default_value("docs/bmnr.json"),
                )
                .arg(
                    Arg::with_name("intraday")
                        .long("intraday")
                        .help("Measure the day's gain against the same-day open instead of the previous close")
                        .takes_value(false),
                )
                .arg(
                    Arg::with_name("dilution-factor")
                        .long("dilution-factor")
                        .value_name("FACTOR")
                        .help("Assume diluted shares are basic shares inflated by FACTOR when no statement reports them")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("push")
                        .short('p')
                        .long("push")
                        .help("Publish the output file via a git commit and force push")
                        .takes_value(false),
                )
                .arg(
                    Arg::with_name("branch")
                        .short('b')
                        .long("branch")
                        .value_name("BRANCH")
                        .help("Branch to force push the snapshot commit to")
                        .takes_value(true)
                        .default_value("main"),
                ),
        )
        .subcommand(
            SubCommand::with_name("publish")
                .about("Publish an existing output file via git")
                .arg(
                    Arg::with_name("symbol")
                        .short('s')
                        .long("symbol")
                        .value_name("SYMBOL")
                        .help("Symbol named in the commit message")
                        .takes_value(true)
                        .default_value("BMNR"),
                )
                .arg(
                    Arg::with_name("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .help("Output JSON file to publish")
                        .takes_value(true)
                        .default_value("docs/bmnr.json"),
                )
                .arg(
                    Arg::with_name("branch")
                        .short('b')
                        .long("branch")
                        .value_name("BRANCH")
                        .help("Branch to force push the snapshot commit to")
                        .takes_value(true)
                        .default_value("main"),
                ),
        )
        .subcommand(
            SubCommand::with_name("show")
                .about("Show the published snapshot record")
                .arg(
                    Arg::with_name("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .help("Snapshot JSON file to read")
                        .takes_value(true)
                        .default_value("docs/bmnr.json"),
                )
                .arg(
                    Arg::with_name("check-remote")
                        .long("check-remote")
                        .value_name("URL")
                        .help("Refresh the local file from the published URL first")
                        .takes_value(true),
                ),
        );

    let matches = app.get_matches();

    if let Some(matches) = matches.subcommand_matches("snapshot") {
        let symbol = matches.value_of("symbol").unwrap();
        let output = matches.value_of("output").unwrap();
        let branch = matches.value_of("branch").unwrap();
        let push = matches.is_present("push");

        // 创建配置
        let mut config = Config::new()
            .with_symbol(symbol)
            .with_output_path(output)
            .with_branch(branch)
            .with_push(push);

        if matches.is_present("intraday") {
            config = config.with_reference_policy(ReferencePolicy::SameDayOpen);
        }
        if let Some(factor) = matches.value_of("dilution-factor") {
            let factor = factor.parse::<f64>().unwrap_or(DEFAULT_DILUTION_FACTOR);
            config = config.with_dilution_policy(DilutionPolicy::Inflated { factor });
        }

        info!(
            "Reference policy: {}, dilution policy: {}",
            config.reference_policy.name(),
            config.dilution_policy.name()
        );

        let push = config.push;
        let branch = config.branch.clone();
        let scraper: Arc<dyn MarketScraper + Send + Sync> = Arc::new(YahooScraper::new()?);
        let service = QuoteService::new(config, scraper);

        // 采集并写入快照；无价格数据时跳过发布
        let record = service.run().await?;
        info!(
            "Captured {}: price={:?} day_gain={:?} ({:?}%)",
            record.symbol, record.price, record.day_gain, record.day_gain_pct
        );

        if push {
            let publisher = GitPublisher::new(&branch);
            publisher.publish(service.output_path(), &publish_message(&record.symbol))?;
        }
    } else if let Some(matches) = matches.subcommand_matches("publish") {
        let symbol = matches.value_of("symbol").unwrap().to_uppercase();
        let output = matches.value_of("output").unwrap();
        let branch = matches.value_of("branch").unwrap();

        if !Path::new(output).exists() {
            warn!("Output file {} does not exist, nothing to publish", output);
            return Err(anyhow::anyhow!("output file {} does not exist", output));
        }

        let publisher = GitPublisher::new(branch);
        publisher.publish(Path::new(output), &publish_message(&symbol))?;
    } else if let Some(matches) = matches.subcommand_matches("show") {
        let output = matches.value_of("output").unwrap().to_string();
        let check_remote = matches.value_of("check-remote").map(str::to_string);

        // 记录提供者使用阻塞HTTP客户端，移出异步上下文执行
        let provider = tokio::task::spawn_blocking(move || match check_remote {
            Some(url) => QuoteRecordProvider::load_with_remote_check(&output, &url),
            None => QuoteRecordProvider::load_from_file(&output),
        })
        .await??;

        let record = provider.record();
        info!("Snapshot: {} at {}", record.symbol, record.timestamp);
        info!("{:-<60}", "");
        info!("Price:                 {:?}", record.price);
        info!("Day gain:              {:?} ({:?}%)", record.day_gain, record.day_gain_pct);
        info!("Market cap:            {:?}", record.market_cap);
        info!(
            "Market cap day gain:   {:?} ({:?}%)",
            record.market_cap_day_gain, record.market_cap_day_gain_pct
        );
        info!("Basic shares:          {:?}", record.basic_shares_outstanding);
        info!(
            "Assumed diluted:       {:?}",
            record.assumed_diluted_shares_outstanding
        );
    } else {
        info!("No command specified. Use --help for usage information.");
    }

    Ok(())
}
