use crate::reply::ReplyTable;

/// Render the reply table as an aligned listing.
pub fn render(table: &ReplyTable) -> String {
    let mut out = format!("{:<12} REPLY\n", "TRIGGER");
    for (trigger, rule) in table.rules() {
        out.push_str(&format!("{:<12} {}\n", trigger, rule));
    }
    out.push_str(&format!("{:<12} {}\n", "(other)", table.fallback()));
    out
}

/// Execute the `rules` command: print the default reply table.
pub fn execute() {
    print!("{}", render(&ReplyTable::default()));
}
