//! Example of navigating nested data after a parse.
//!
//! cargo run --package confdata --example nested_access

use confdata::{ConfigData, json};

fn main() -> Result<(), confdata::ParseError> {
    let mut cd = ConfigData::new();
    json::parse(
        r#"{"users": [{"name": "Amy"}, {"name": "Bob"}], "count": 2}"#,
        &mut cd,
    )?;

    // root["users"][1]["name"]
    let users = cd.object_lookup(cd.root(), "users");
    let second = cd.array_item(users, 1);
    let name = cd.object_lookup(second, "name");

    println!("{}", cd.to_string(name));
    Ok(())
}
