const LOGO: &str = r#"
   ░▒▓██████▓▒░  ░▒▓███████▓▒░  ░▒▓██████████████▓▒░   ░▒▓██████▓▒░  ░▒▓███████▓▒░
  ░▒▓█▓▒░ ░▒▓█▓▒░ ░▒▓█▓▒░ ░▒▓█▓▒░ ░▒▓█▓▒░ ░▒▓█▓▒░ ░▒▓█▓▒░ ░▒▓█▓▒░ ░▒▓█▓▒░ ░▒▓█▓▒░ ░▒▓█▓▒░
  ░▒▓████████▓▒░ ░▒▓█▓▒░ ░▒▓█▓▒░ ░▒▓█▓▒░ ░▒▓█▓▒░ ░▒▓█▓▒░ ░▒▓████████▓▒░ ░▒▓█▓▒░ ░▒▓█▓▒░
  ░▒▓█▓▒░ ░▒▓█▓▒░ ░▒▓█▓▒░ ░▒▓█▓▒░ ░▒▓█▓▒░ ░▒▓█▓▒░ ░▒▓█▓▒░ ░▒▓█▓▒░ ░▒▓█▓▒░ ░▒▓█▓▒░ ░▒▓█▓▒░
  ░▒▓█▓▒░ ░▒▓█▓▒░ ░▒▓███████▓▒░  ░▒▓█▓▒░ ░▒▓█▓▒░ ░▒▓█▓▒░ ░▒▓█▓▒░ ░▒▓█▓▒░ ░▒▓█▓▒░ ░▒▓█▓▒░

Active Directory account administration over LDAP
"#;

use adman::args::{get_connect_arguments, parse_control_arg, Cli, Command, DnCommand, UacCommand};
use adman::commands::actions::{describe_control, run_actions_menu, run_batch_action, Session};
use adman::config::UserDefaults;
use adman::debug;
use adman::dn::{self, ObjectKind};
use adman::error::Result;
use adman::help::*;
use adman::ldap::ldap_connect;
use adman::uac;
use clap::Parser;
use dialoguer::{theme::ColorfulTheme, Confirm, Select};
use std::path::Path;
use std::process::ExitCode;

const MAIN_OPTIONS: &[&str] = &[
    "Connect (Account Administration)",
    "Build DN",
    "Parse DN",
    "Decode userAccountControl",
    "Show User Defaults",
    "Edit User Defaults",
    "Version",
    "Help",
    "Exit",
];

fn main() -> ExitCode {
    let cli = Cli::parse();
    debug::init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[!] {}", e);
            if debug::is_debug_enabled() {
                eprintln!("[DEBUG] {:?}", e);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Command::Dn(DnCommand::Build {
            leaf,
            domain,
            ou,
            group,
        })) => {
            let kind = if group { ObjectKind::Group } else { ObjectKind::User };
            println!("{}", dn::build(&leaf, &domain, &ou, kind)?);
        }
        Some(Command::Dn(DnCommand::Parse { dn })) => print_parsed(&dn),
        Some(Command::Uac(UacCommand::Decode { value })) => println!("{}", describe_control(value)),
        Some(Command::Uac(UacCommand::Encode { names })) => println!("{}", uac::encode(&names)?),
        Some(Command::Batch { action, file }) => {
            let defaults = UserDefaults::load(&cli.config)?;
            let (mut ldap, search_base) = ldap_connect(&cli.connection.into_config()?)?;
            let session = Session::new(&search_base, &defaults);
            let report = run_batch_action(&mut ldap, &session, action, &file)?;
            print_report(&format!("{:?}", action), &report);
            let _ = ldap.unbind();
        }
        Some(Command::Interactive) | None => interactive(&cli.config)?,
    }
    Ok(())
}

fn print_parsed(dn: &str) {
    let parsed = dn::parse(dn);
    let show = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());
    println!("leaf:    {}", show(parsed.leaf_cn));
    println!("domain:  {}", show(parsed.domain));
    println!("ou path: {}", show(parsed.ou_path));
}

fn interactive(config_path: &Path) -> Result<()> {
    println!("{}", LOGO);
    let mut defaults = UserDefaults::load(config_path)?;

    loop {
        add_terminal_spacing(1);
        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Choose an option")
            .default(0)
            .items(MAIN_OPTIONS)
            .interact()?;

        match selection {
            0 => handle_connect(&defaults),
            1 => handle_build_dn(),
            2 => {
                if let Some(dn) = read_input_with_history("Enter DN: ", "dn") {
                    print_parsed(&dn);
                }
            }
            3 => handle_decode_control(),
            4 => match defaults.to_json_string() {
                Ok(json) => println!("[*] {}\n{}", config_path.display(), json),
                Err(e) => eprintln!("[!] {}", e),
            },
            5 => {
                if let Err(e) = handle_edit_defaults(&mut defaults, config_path) {
                    eprintln!("[!] {}", e);
                }
            }
            6 => println!("v{}", env!("CARGO_PKG_VERSION")),
            7 => {
                show_help_main();
                show_help_connect();
            }
            8 => {
                if confirm_exit() {
                    break;
                }
            }
            _ => unreachable!(),
        }
    }

    Ok(())
}

fn handle_connect(defaults: &UserDefaults) {
    let Some(ldap_config) = get_connect_arguments() else {
        println!("Required arguments not provided!");
        return;
    };

    let (mut ldap, search_base) = match ldap_connect(&ldap_config) {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("[!] Failed to connect to LDAP server: {}. Check credentials or connection.", e);
            return;
        }
    };

    println!("\nSuccessfully connected to LDAP server.\n");
    println!(
        "{}",
        get_prompt_string(&ldap_config.username, &ldap_config.domain, &ldap_config.server)
    );

    let session = Session::new(&search_base, defaults);
    if let Err(e) = run_actions_menu(&mut ldap, &session) {
        eprintln!("[!] {}", e);
    }
    let _ = ldap.unbind();
}

fn handle_build_dn() {
    let Some(leaf) = read_input_with_history("Enter name (CN): ", "dn") else {
        return;
    };
    let domain = read_input("Enter domain: ");
    let ou = read_input("Enter OU path (parent first, e.g. Sales/IT): ");
    let group = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt("Is this a group?")
        .default(false)
        .interact()
        .unwrap_or(false);

    let kind = if group { ObjectKind::Group } else { ObjectKind::User };
    match dn::build(&leaf, &domain, &ou, kind) {
        Ok(dn) => println!("[+] {}", dn),
        Err(e) => eprintln!("[!] {}", e),
    }
}

fn handle_decode_control() {
    let raw = read_input("Enter userAccountControl value (decimal or 0x hex): ");
    match parse_control_arg(&raw) {
        Ok(value) => println!("[*] {}", describe_control(value)),
        Err(e) => eprintln!("[!] {}", e),
    }
}

const DEFAULTS_OPTIONS: &[&str] = &[
    "Set Attribute",
    "Remove Attribute",
    "Save",
    "Discard Changes",
];

/// Edit a copy of the defaults and write it out on "Save".
fn handle_edit_defaults(defaults: &mut UserDefaults, config_path: &Path) -> Result<()> {
    let mut edited = defaults.clone();

    let ou = read_input(&format!(
        "Enter default OU (current: {}, '-' resets, empty keeps): ",
        edited.default_ou()
    ));
    match ou.as_str() {
        "" => {}
        "-" => edited.set_default_ou(""),
        ou => edited.set_default_ou(ou),
    }

    loop {
        println!("[*] Pending defaults:\n{}", edited.to_json_string()?);
        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Edit User Defaults")
            .default(0)
            .items(DEFAULTS_OPTIONS)
            .interact()?;

        match selection {
            0 => {
                let name = read_input("Attribute name (userAccountControl allowed): ");
                let value = read_input("Value (text, integer, or byte array like [1,2]): ");
                if let Err(e) = edited.set_attribute(&name, &value) {
                    eprintln!("[!] {}", e);
                }
            }
            1 => {
                let name = read_input("Attribute name to remove: ");
                if !edited.remove_attribute(&name) {
                    println!("[!] No default attribute named {}", name);
                }
            }
            2 => {
                edited.save(config_path)?;
                *defaults = edited;
                println!("[+] User defaults written to {}", config_path.display());
                return Ok(());
            }
            3 => {
                println!("Returning to the menu...");
                return Ok(());
            }
            _ => unreachable!(),
        }
    }
}

fn confirm_exit() -> bool {
    match Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt("Are you sure you want to quit?")
        .interact()
    {
        Ok(true) => {
            println!("Goodbye!");
            true
        }
        Ok(false) => {
            println!("Returning to the menu...");
            false
        }
        Err(_) => false,
    }
}
