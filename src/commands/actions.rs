use crate::batch::{BatchReport, MembershipRow, NewUserRow, ObjectRow};
use crate::commands::{block, expire, groups, users};
use crate::config::UserDefaults;
use crate::directory::{first_value, Directory};
use crate::dn::DomainName;
use crate::error::Result;
use crate::help::{
    add_terminal_spacing, print_objects, print_report, read_input, read_input_with_history,
};
use crate::uac;
use dialoguer::{theme::ColorfulTheme, Password, Select};
use std::path::Path;

const GENERATED_PASSWORD_LENGTH: usize = 16;

const ACTIONS_OPTIONS: &[&str] = &[
    "List Users",
    "Count Users",
    "Search Users",
    "Find User by sAMAccountName",
    "Create User",
    "Delete User",
    "Toggle Block",
    "Block User",
    "Unblock User",
    "Count Blocked Users",
    "Set Account Expiration",
    "Count Expiring Users",
    "List Groups",
    "List Group Members",
    "Create Group",
    "Create Group from Config File",
    "Delete Group",
    "Delete Group by Name",
    "Add User to Group",
    "Remove User from Group",
    "Batch Operations",
    "Back",
];

const BATCH_OPTIONS: &[&str] = &[
    "Import Users",
    "Delete Users",
    "Block Users",
    "Unblock Users",
    "Expire Users",
    "Add Group Members",
    "Remove Group Members",
    "Back",
];

/// Everything a menu handler needs besides the directory itself.
pub struct Session<'a> {
    pub search_base: &'a str,
    pub domain: String,
    pub defaults: &'a UserDefaults,
}

impl<'a> Session<'a> {
    pub fn new(search_base: &'a str, defaults: &'a UserDefaults) -> Self {
        let domain = DomainName::from_dn_components(search_base)
            .map(|d| d.to_dotted_string())
            .unwrap_or_default();
        Self {
            search_base,
            domain,
            defaults,
        }
    }
}

pub fn run_actions_menu<D: Directory + ?Sized>(directory: &mut D, session: &Session) -> Result<()> {
    loop {
        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Actions Menu")
            .default(0)
            .items(ACTIONS_OPTIONS)
            .interact()?;

        add_terminal_spacing(1);

        let outcome = match selection {
            0 => handle_list_users(directory, session),
            1 => users::count_users(directory, session.search_base)
                .map(|count| println!("[*] Total users: {}", count)),
            2 => handle_search_users(directory, session),
            3 => handle_find_user(directory, session),
            4 => handle_create_user(directory, session),
            5 => handle_delete_user(directory, session),
            6 => handle_toggle_block(directory, session),
            7 => handle_block_user(directory, session),
            8 => handle_unblock_user(directory, session),
            9 => block::blocked_count(directory, session.search_base)
                .map(|count| println!("[*] Disabled accounts: {}", count)),
            10 => handle_set_expiration(directory, session),
            11 => expire::expiring_count(directory, session.search_base)
                .map(|count| println!("[*] Accounts with an expiry date: {}", count)),
            12 => groups::list_groups(directory, session.search_base)
                .map(|list| print_objects("group", &list)),
            13 => handle_list_members(directory),
            14 => handle_create_group(directory, session),
            15 => handle_group_config(directory, session),
            16 => handle_delete_group(directory, session),
            17 => handle_delete_group_by_name(directory, session),
            18 => handle_membership(directory, session, true),
            19 => handle_membership(directory, session, false),
            20 => run_batch_menu(directory, session),
            21 => break,
            _ => unreachable!(),
        };

        if let Err(e) = outcome {
            eprintln!("[!] {}", e);
            add_terminal_spacing(1);
        }
    }

    Ok(())
}

fn read_required(prompt: &str, what: &str) -> Option<String> {
    let value = read_input_with_history(prompt, "actions")?;
    if value.is_empty() {
        println!("[!] {} is required", what);
        return None;
    }
    Some(value)
}

/// Name, domain and OU path of one object. An empty domain means the
/// connected one.
fn read_object(label: &str, session: &Session) -> Option<ObjectRow> {
    let name = read_required(&format!("Enter {} name (CN): ", label), "Name")?;
    let domain = read_input(&format!("Enter domain (leave empty for {}): ", session.domain));
    let ou_path = read_input_with_history(
        "Enter OU path, parent first (e.g. Sales/IT, leave empty for default): ",
        "actions",
    )?;

    Some(ObjectRow {
        name,
        domain: if domain.is_empty() {
            session.domain.clone()
        } else {
            domain
        },
        ou_path,
    })
}

fn handle_list_users<D: Directory + ?Sized>(directory: &mut D, session: &Session) -> Result<()> {
    let list = users::list_users(directory, session.search_base)?;
    print_objects("user", &list);
    Ok(())
}

fn handle_search_users<D: Directory + ?Sized>(directory: &mut D, session: &Session) -> Result<()> {
    let Some(term) = read_required("Search users by name (cn contains): ", "Search term") else {
        return Ok(());
    };
    let found = users::search_users(directory, session.search_base, &term)?;
    print_objects("user", &found);
    Ok(())
}

fn handle_find_user<D: Directory + ?Sized>(directory: &mut D, session: &Session) -> Result<()> {
    let Some(sam) = read_required("Enter sAMAccountName: ", "sAMAccountName") else {
        return Ok(());
    };
    match users::find_by_sam(directory, session.search_base, &sam)? {
        Some(entry) => {
            println!("[+] {}", entry.dn);
            let control =
                first_value(&entry, "userAccountControl").and_then(block::parse_control_value);
            if let Some(control) = control {
                println!("    userAccountControl: {}", describe_control(control));
            }
        }
        None => println!("[!] No user with sAMAccountName {}", sam),
    }
    add_terminal_spacing(1);
    Ok(())
}

fn handle_create_user<D: Directory + ?Sized>(directory: &mut D, session: &Session) -> Result<()> {
    let Some(username) = read_required("Enter username (sAMAccountName): ", "Username") else {
        return Ok(());
    };
    let Some(first_name) = read_required("Enter first name: ", "First name") else {
        return Ok(());
    };
    let Some(last_name) = read_required("Enter last name: ", "Last name") else {
        return Ok(());
    };
    let mut password = Password::with_theme(&ColorfulTheme::default())
        .with_prompt("Enter password (leave empty to generate one)")
        .allow_empty_password(true)
        .interact()?;
    if password.is_empty() {
        password = users::generate_password(GENERATED_PASSWORD_LENGTH);
        println!("[*] Generated password: {}", password);
    }

    let user = NewUserRow {
        username,
        first_name,
        last_name,
        password,
    };
    let dn = users::create_user(directory, session.search_base, session.defaults, &user)?;
    println!("[+] User {} created at {}", user.username, dn);
    add_terminal_spacing(1);
    Ok(())
}

fn handle_delete_user<D: Directory + ?Sized>(directory: &mut D, session: &Session) -> Result<()> {
    let Some(target) = read_object("user", session) else {
        return Ok(());
    };
    let dn = users::delete_user(directory, &target.name, &target.domain, &target.ou_path)?;
    println!("[+] Deleted {}", dn);
    add_terminal_spacing(1);
    Ok(())
}

fn handle_toggle_block<D: Directory + ?Sized>(directory: &mut D, session: &Session) -> Result<()> {
    let Some(target) = read_object("user", session) else {
        return Ok(());
    };
    let state = block::toggle_block(directory, &target.name, &target.domain, &target.ou_path)?;
    println!("[+] Account {} is now {}", target.name, state);
    add_terminal_spacing(1);
    Ok(())
}

fn handle_block_user<D: Directory + ?Sized>(directory: &mut D, session: &Session) -> Result<()> {
    let Some(target) = read_object("user", session) else {
        return Ok(());
    };
    if block::block_user(directory, &target.name, &target.domain, &target.ou_path)? {
        println!("[+] Account {} disabled", target.name);
    } else {
        println!("[*] Account {} was already disabled", target.name);
    }
    add_terminal_spacing(1);
    Ok(())
}

fn handle_unblock_user<D: Directory + ?Sized>(directory: &mut D, session: &Session) -> Result<()> {
    let Some(target) = read_object("user", session) else {
        return Ok(());
    };
    if block::unblock_user(directory, &target.name, &target.domain, &target.ou_path)? {
        println!("[+] Account {} enabled", target.name);
    } else {
        println!("[*] Account {} was already enabled", target.name);
    }
    add_terminal_spacing(1);
    Ok(())
}

fn handle_set_expiration<D: Directory + ?Sized>(directory: &mut D, session: &Session) -> Result<()> {
    let Some(target) = read_object("user", session) else {
        return Ok(());
    };
    let Some(date) = read_required("Enter expiration date (DD-MM-YYYY): ", "Date") else {
        return Ok(());
    };
    let value = expire::set_expiration(directory, &target.name, &target.domain, &target.ou_path, &date)?;
    println!("[+] accountExpires for {} set to {}", target.name, value);
    add_terminal_spacing(1);
    Ok(())
}

fn handle_list_members<D: Directory + ?Sized>(directory: &mut D) -> Result<()> {
    let Some(group_dn) = read_required("Enter group DN: ", "Group DN") else {
        return Ok(());
    };
    let members = groups::list_members(directory, &group_dn)?;
    println!("[*] {} member(s) of {}", members.len(), group_dn);
    for member in members {
        println!("    {}", member);
    }
    add_terminal_spacing(1);
    Ok(())
}

fn handle_create_group<D: Directory + ?Sized>(directory: &mut D, session: &Session) -> Result<()> {
    let Some(name) = read_required("Enter group name: ", "Group name") else {
        return Ok(());
    };
    let Some(ou_path) = read_required("Enter target OU path (e.g. Groups or CN=Users): ", "OU path")
    else {
        return Ok(());
    };
    let description = read_input("Enter description (optional): ");
    let mail = read_input("Enter e-mail (optional): ");

    let group = groups::NewGroup {
        name,
        ou_path,
        description: (!description.is_empty()).then_some(description),
        mail: (!mail.is_empty()).then_some(mail),
    };
    let dn = groups::create_group(directory, session.search_base, &group)?;
    println!("[+] Group created at {}", dn);
    add_terminal_spacing(1);
    Ok(())
}

fn handle_delete_group<D: Directory + ?Sized>(directory: &mut D, session: &Session) -> Result<()> {
    let Some(target) = read_object("group", session) else {
        return Ok(());
    };
    let dn = groups::delete_group(directory, &target.name, &target.domain, &target.ou_path)?;
    println!("[+] Deleted {}", dn);
    add_terminal_spacing(1);
    Ok(())
}

fn handle_group_config<D: Directory + ?Sized>(directory: &mut D, session: &Session) -> Result<()> {
    let Some(file) = read_required("Enter group config path (e.g. group-config.json): ", "File path")
    else {
        return Ok(());
    };
    match groups::apply_group_config(directory, session.search_base, Path::new(&file))? {
        groups::GroupConfigOutcome::Created(dn) => println!("[+] Group created at {}", dn),
        groups::GroupConfigOutcome::Deleted(dn) => println!("[+] Deleted {}", dn),
    }
    add_terminal_spacing(1);
    Ok(())
}

fn handle_delete_group_by_name<D: Directory + ?Sized>(
    directory: &mut D,
    session: &Session,
) -> Result<()> {
    let Some(name) = read_required("Enter group name (CN): ", "Group name") else {
        return Ok(());
    };
    let dn = groups::delete_group_by_name(directory, session.search_base, &name)?;
    println!("[+] Deleted {}", dn);
    add_terminal_spacing(1);
    Ok(())
}

fn handle_membership<D: Directory + ?Sized>(directory: &mut D, session: &Session, add: bool) -> Result<()> {
    let by_dn = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Identify objects by")
        .default(0)
        .items(&["Name, domain and OU path", "Distinguished names", "sAMAccountName"])
        .interact()?;

    match by_dn {
        0 => {
            let Some(user) = read_object("user", session) else {
                return Ok(());
            };
            let Some(group) = read_object("group", session) else {
                return Ok(());
            };
            let membership = MembershipRow { user, group };
            if add {
                groups::add_member(directory, &membership)?;
            } else {
                groups::remove_member(directory, &membership)?;
            }
        }
        1 => {
            let Some(user_dn) = read_required("Enter user DN: ", "User DN") else {
                return Ok(());
            };
            let Some(group_dn) = read_required("Enter group DN: ", "Group DN") else {
                return Ok(());
            };
            if add {
                groups::add_member_by_dn(directory, &user_dn, &group_dn)?;
            } else {
                groups::remove_member_by_dn(directory, &user_dn, &group_dn)?;
            }
        }
        _ => {
            if !add {
                println!("[!] Removal by sAMAccountName is not supported, use names or DNs");
                return Ok(());
            }
            let Some(user) = read_required("Enter user (sAMAccountName): ", "User") else {
                return Ok(());
            };
            let Some(group) = read_required("Enter group (sAMAccountName): ", "Group") else {
                return Ok(());
            };
            groups::add_member_by_sam(directory, session.search_base, &user, &group)?;
        }
    }

    println!("[+] Membership {}", if add { "added" } else { "removed" });
    add_terminal_spacing(1);
    Ok(())
}

/// Run one batch action by its CLI name.
pub fn run_batch_action<D: Directory + ?Sized>(
    directory: &mut D,
    session: &Session,
    action: BatchAction,
    path: &Path,
) -> Result<BatchReport> {
    match action {
        BatchAction::ImportUsers => {
            users::import_users(directory, session.search_base, session.defaults, path)
        }
        BatchAction::DeleteUsers => users::delete_users(directory, path),
        BatchAction::Block => block::block_from_file(directory, path),
        BatchAction::Unblock => block::unblock_from_file(directory, path),
        BatchAction::Expire => expire::expire_from_file(directory, path),
        BatchAction::AddMembers => groups::add_members_from_file(directory, path),
        BatchAction::RemoveMembers => groups::remove_members_from_file(directory, path),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BatchAction {
    ImportUsers,
    DeleteUsers,
    Block,
    Unblock,
    Expire,
    AddMembers,
    RemoveMembers,
}

const BATCH_ACTIONS: [BatchAction; 7] = [
    BatchAction::ImportUsers,
    BatchAction::DeleteUsers,
    BatchAction::Block,
    BatchAction::Unblock,
    BatchAction::Expire,
    BatchAction::AddMembers,
    BatchAction::RemoveMembers,
];

fn run_batch_menu<D: Directory + ?Sized>(directory: &mut D, session: &Session) -> Result<()> {
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Batch Operations")
        .default(0)
        .items(BATCH_OPTIONS)
        .interact()?;

    let Some(action) = BATCH_ACTIONS.get(selection).copied() else {
        return Ok(());
    };
    let Some(file) = read_required("Enter CSV or XLSX file path: ", "File path") else {
        return Ok(());
    };

    let report = run_batch_action(directory, session, action, Path::new(&file))?;
    print_report(BATCH_OPTIONS[selection], &report);
    Ok(())
}

/// One-line summary of a control value, as the menus print it.
pub fn describe_control(value: u32) -> String {
    format!(
        "{} ({}): {}",
        value,
        uac::AccountState::of(value),
        uac::decode(value)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::memory::MemoryDirectory;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn session_derives_domain_from_base() {
        let defaults = UserDefaults::default();
        let session = Session::new("DC=corp,DC=example,DC=com", &defaults);
        assert_eq!(session.domain, "corp.example.com");
    }

    #[test]
    fn batch_menu_and_actions_line_up() {
        assert_eq!(BATCH_ACTIONS.len() + 1, BATCH_OPTIONS.len());
    }

    #[test]
    fn back_is_the_last_action() {
        assert_eq!(ACTIONS_OPTIONS.len(), 22);
        assert_eq!(ACTIONS_OPTIONS[21], "Back");
        assert_eq!(ACTIONS_OPTIONS[17], "Delete Group by Name");
    }

    #[test]
    fn describe_control_value() {
        assert_eq!(describe_control(514), "514 (disabled): ACCOUNTDISABLE | NORMAL_ACCOUNT");
    }

    #[test]
    fn batch_action_dispatch() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("block.csv");
        fs::write(&path, "name,domain,ou\njdoe,example.com,\n").unwrap();

        let mut dir = MemoryDirectory::new();
        dir.insert(
            "CN=jdoe,CN=Users,DC=example,DC=com",
            &[("objectClass", &["user"]), ("userAccountControl", &["512"])],
        );

        let defaults = UserDefaults::default();
        let session = Session::new("DC=example,DC=com", &defaults);
        let report = run_batch_action(&mut dir, &session, BatchAction::Block, &path).unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(
            dir.attr("CN=jdoe,CN=Users,DC=example,DC=com", "userAccountControl"),
            ["514"]
        );
    }
}
