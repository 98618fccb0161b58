//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::model::{Account, Group, OtpType};
use crate::vault::{OtpCode, PagedResult};

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Print one page of accounts (ID, Issuer, Label, Type, Digits, Created).
pub fn print_accounts_table(page: &PagedResult<Account>, page_no: usize, size: usize) {
    if page.total == 0 {
        info("No accounts in this vault yet.");
        tip("Run `authvault add --uri <otpauth://...>` to add your first account.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["ID", "Issuer", "Label", "Type", "Digits", "Created"]);

    for a in &page.data {
        let kind = match a.otp_type {
            OtpType::Totp => format!("TOTP/{}s", a.period.unwrap_or_default()),
            OtpType::Hotp => format!("HOTP#{}", a.counter.unwrap_or_default()),
        };
        table.add_row(vec![
            a.id.to_string(),
            a.issuer.clone(),
            a.label.clone(),
            kind,
            a.digits.to_string(),
            a.created_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }

    println!("{table}");
    let size = size.max(1);
    let pages = (page.total + size - 1) / size;
    println!(
        "{}",
        style(format!("page {page_no}/{pages}, {} account(s)", page.total)).dim()
    );
}

pub fn print_groups_table(groups: &[Group]) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["ID", "Name", "Children"]);
    for g in groups {
        table.add_row(vec![
            g.uuid.to_string(),
            g.name.clone(),
            g.children.len().to_string(),
        ]);
    }
    println!("{table}");
}

/// Print a code as `123 456`, with the seconds left for TOTP.
pub fn print_code(account: &Account, otp: &OtpCode) {
    let (head, tail) = otp.code.split_at(otp.code.len() / 2);
    let code = style(format!("{head} {tail}")).bold().green();
    match otp.remaining {
        Some(secs) => println!("{code}  {}", style(format!("({secs}s left)")).dim()),
        None => println!("{code}"),
    }
    tip(&format!("{}: {}", account.issuer, account.label));
}
