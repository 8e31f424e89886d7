use clap::{Arg, ArgAction, ArgMatches, Command};
use std::error::Error;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use romsync::config::{
	ConfigStore, SyncConfig, TomlConfigStore, KEY_DEVICE, KEY_HOST, KEY_LAST_SYNC, KEY_PORT,
	KEY_REMOTE_FOLDER,
};
use romsync::logging::*;
use romsync::progress::CliProgressCallback;
use romsync::utils::setup_signal_handlers;
use romsync::{SyncManager, SyncStatus};

const KNOWN_KEYS: [&str; 5] = [KEY_HOST, KEY_PORT, KEY_DEVICE, KEY_REMOTE_FOLDER, KEY_LAST_SYNC];

///////////////////////
// Utility functions //
///////////////////////

fn open_store(matches: &ArgMatches) -> Result<TomlConfigStore, Box<dyn Error>> {
	let path = matches
		.get_one::<String>("config")
		.map(PathBuf::from)
		.unwrap_or_else(TomlConfigStore::default_path);
	debug!("Config file: {}", path.display());
	Ok(TomlConfigStore::open(path)?)
}

/// Defaults, then the config file, then environment, then flags
fn load_config(matches: &ArgMatches, store: &dyn ConfigStore) -> Result<SyncConfig, Box<dyn Error>> {
	let mut config = SyncConfig::from_store(store);
	config.apply_env();
	if let Some(host) = matches.get_one::<String>("host") {
		config.host = host.clone();
	}
	if let Some(port) = matches.get_one::<u16>("port") {
		config.port = *port;
	}
	if let Some(device) = matches.get_one::<String>("device") {
		config.device = device.clone();
	}
	Ok(config)
}

fn now_secs() -> f64 {
	SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0)
}

//////////////
// Commands //
//////////////

async fn cmd_devices(config: SyncConfig) -> Result<(), Box<dyn Error>> {
	let mut manager = SyncManager::new(config, Box::new(CliProgressCallback::new()));
	let devices = manager.list_devices().await;
	manager.disconnect().await;
	let devices = devices?;
	if devices.is_empty() {
		eprintln!("No devices found");
	}
	for device in devices {
		println!("{}", device);
	}
	Ok(())
}

async fn cmd_sync(
	sub: &ArgMatches,
	mut config: SyncConfig,
	store: &mut TomlConfigStore,
) -> Result<bool, Box<dyn Error>> {
	let local_dir = sub.get_one::<String>("local_dir").ok_or("sync: LOCAL_DIR argument required")?;
	if let Some(folder) = sub.get_one::<String>("remote_folder") {
		config.remote_folder = folder.clone();
	}
	config.dry_run = sub.get_flag("dry_run");
	let last_sync = if sub.get_flag("full") { 0.0 } else { config.last_sync };
	let cleanup = sub.get_flag("cleanup");
	let dry_run = config.dry_run;

	let started = now_secs();
	let mut manager = SyncManager::new(config, Box::new(CliProgressCallback::new()));
	setup_signal_handlers(manager.cancel_token());
	let report = manager.sync(local_dir, last_sync, cleanup).await;

	if report.status == SyncStatus::Completed && !dry_run {
		store.set(KEY_LAST_SYNC, &started.to_string());
		store.save()?;
		debug!("Stored last sync time {}", started);
	}
	Ok(report.is_complete())
}

fn cmd_config(sub: &ArgMatches, store: &mut TomlConfigStore) -> Result<(), Box<dyn Error>> {
	if let Some(set) = sub.subcommand_matches("set") {
		let key = set.get_one::<String>("key").ok_or("config set: KEY required")?;
		let value = set.get_one::<String>("value").ok_or("config set: VALUE required")?;
		if !KNOWN_KEYS.contains(&key.as_str()) {
			return Err(format!("Unknown key {} (known: {})", key, KNOWN_KEYS.join(", ")).into());
		}
		store.set(key, value);
		SyncConfig::from_store(&*store).validate()?;
		store.save()?;
		eprintln!("{} = {}", key, value);
		return Ok(());
	}

	println!("# {}", store.path().display());
	let config = SyncConfig::from_store(&*store);
	println!("{} = {}", KEY_HOST, config.host);
	println!("{} = {}", KEY_PORT, config.port);
	println!("{} = {}", KEY_DEVICE, config.device);
	println!("{} = {}", KEY_REMOTE_FOLDER, config.remote_folder);
	println!("{} = {}", KEY_LAST_SYNC, config.last_sync);
	for (key, value) in store.entries() {
		if !KNOWN_KEYS.contains(&key) {
			println!("# unused: {} = {}", key, value);
		}
	}
	Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	init_tracing();

	let matches = Command::new("romsync")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Mirror a local ROM collection onto a flashcart")
		.subcommand_required(true)
		.arg(Arg::new("host").long("host").global(true).value_name("HOST").help("Daemon host"))
		.arg(
			Arg::new("port")
				.long("port")
				.global(true)
				.value_name("PORT")
				.value_parser(clap::value_parser!(u16))
				.help("Daemon port"),
		)
		.arg(
			Arg::new("device")
				.short('d')
				.long("device")
				.global(true)
				.value_name("DEVICE")
				.help("Device to attach (default: first found)"),
		)
		.arg(
			Arg::new("config")
				.short('c')
				.long("config")
				.global(true)
				.value_name("FILE")
				.help("Config file (default: ~/.romsync/config.toml)"),
		)
		.subcommand(Command::new("devices").about("List devices seen by the daemon"))
		.subcommand(
			Command::new("sync")
				.about("Upload new and modified ROMs")
				.arg(Arg::new("local_dir").value_name("LOCAL_DIR").required(true))
				.arg(
					Arg::new("remote_folder")
						.short('r')
						.long("remote-folder")
						.value_name("FOLDER")
						.help("Folder on the SD card"),
				)
				.arg(
					Arg::new("full")
						.long("full")
						.action(ArgAction::SetTrue)
						.help("Ignore the last sync time and upload everything"),
				)
				.arg(
					Arg::new("cleanup")
						.long("cleanup")
						.action(ArgAction::SetTrue)
						.help("Remove remote ROMs that no longer exist locally"),
				)
				.arg(
					Arg::new("dry_run")
						.short('n')
						.long("dry-run")
						.action(ArgAction::SetTrue)
						.help("Show what would be done without writing to the device"),
				),
		)
		.subcommand(
			Command::new("config")
				.about("Show or change stored settings")
				.subcommand(Command::new("show").about("Print the effective stored settings"))
				.subcommand(
					Command::new("set")
						.about("Store a setting")
						.arg(Arg::new("key").value_name("KEY").required(true))
						.arg(Arg::new("value").value_name("VALUE").required(true)),
				),
		)
		.get_matches();

	let mut store = open_store(&matches)?;

	if matches.subcommand_matches("devices").is_some() {
		let config = load_config(&matches, &store)?;
		cmd_devices(config).await?;
	} else if let Some(sub) = matches.subcommand_matches("sync") {
		let config = load_config(&matches, &store)?;
		if !cmd_sync(sub, config, &mut store).await? {
			std::process::exit(1);
		}
	} else if let Some(sub) = matches.subcommand_matches("config") {
		cmd_config(sub, &mut store)?;
	}

	Ok(())
}

// vim: ts=4
