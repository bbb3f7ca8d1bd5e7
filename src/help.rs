use crate::batch::BatchReport;
use crate::commands::DirectoryObject;
use chrono::Local;
use rustyline::DefaultEditor;
use std::io::{self, Write};

pub fn show_help_main() {
    println!("\nHelp Information:");
    println!("1. 'Connect' - Bind to a domain controller and manage accounts.");
    println!("2. 'Build DN' - Build a distinguished name from name, domain and OU path.");
    println!("3. 'Parse DN' - Split a distinguished name into name, domain and OU path.");
    println!("4. 'Decode userAccountControl' - Show the flags set in a control value.");
    println!("5. 'Show User Defaults' - Print the defaults applied to new users.");
    println!("6. 'Edit User Defaults' - Change the default OU and attributes, then save them.");
    println!("7. 'Version' - Shows Version.");
    println!("8. 'Help' - Shows this help message.");
    println!("9. 'Exit' - Exits the program.");
}

pub fn show_help_connect() {
    println!("\n=== Connection ===");
    println!("   -s <server> -u <username> -p <password> -d <domain>");
    println!("   Example: -s ldaps://dc01.corp.local:636 -u admin -p 'P@ssw0rd' -d corp.local");
    println!("   A bare host is reached over ldap://. The bind name is CORP\\admin.\n");

    println!("=== OU paths ===");
    println!("   Parent first, separated by '/': Sales/IT -> OU=IT,OU=Sales");
    println!("   'Users' and 'Builtin' name the built-in containers in any position.");
    println!("   Write OU=Users for an organizational unit literally named Users.");
    println!("   Use \\/ for a slash inside a name.\n");

    println!("=== Batch files ===");
    println!("   CSV or spreadsheet (.xlsx, .xls, .ods; first sheet) with a header row.");
    println!("   delete/block/unblock: name,domain,ou_path");
    println!("   expire:               name,domain,ou_path,date (DD-MM-YYYY)");
    println!("   add/remove members:   user,user_domain,user_ou,group,group_domain,group_ou");
    println!("   import users:         username,first_name,last_name,password (by header)");
    println!("\n");
}

pub fn add_terminal_spacing(lines: u8) {
    for _ in 0..lines {
        println!();
    }
}

pub fn get_prompt_string(username: &str, domain: &str, server: &str) -> String {
    format!("{}@{}\n({})", username, domain, server)
}

pub fn get_timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn read_input(prompt: &str) -> String {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return String::new();
    }
    input.trim().to_string()
}

fn history_file(module: &str) -> String {
    format!(".adman_{}_history.txt", module)
}

/// Line input with per-module history kept next to the working directory.
/// `None` when the user aborts with Ctrl-C or Ctrl-D.
pub fn read_input_with_history(prompt: &str, module: &str) -> Option<String> {
    let mut editor = match DefaultEditor::new() {
        Ok(e) => e,
        Err(_) => return Some(read_input(prompt)),
    };
    let path = history_file(module);
    editor.load_history(&path).ok();

    let line = editor.readline(prompt).ok()?;
    let line = line.trim().to_string();
    if !line.is_empty() {
        editor.add_history_entry(line.as_str()).ok();
        editor.save_history(&path).ok();
    }
    Some(line)
}

pub fn print_objects(kind: &str, objects: &[DirectoryObject]) {
    println!("[*] {} {}(s) found", objects.len(), kind);
    println!("-------------------------------------------------------------------------------");
    for object in objects {
        println!("{:<30} {}", object.cn, object.dn);
    }
    add_terminal_spacing(1);
}

pub fn print_report(action: &str, report: &BatchReport) {
    println!("\n[{}] {}: {}", get_timestamp(), action, report);
    for failure in &report.failures {
        eprintln!("[!] line {}: {}", failure.line, failure.reason);
    }
    add_terminal_spacing(1);
}
