use crate::auth::{generate_jwt, Identity};

pub fn handle(username: String, admin: bool) -> anyhow::Result<()> {
    let token = generate_jwt(&Identity {
        username,
        is_admin: admin,
    })?;
    println!("{}", token);
    Ok(())
}
