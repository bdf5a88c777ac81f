//! Account commands.

use food_client::FoodClient;
use food_client::models::{Credentials, ProfileUpdate, SignupRequest, UserProfile};
use food_client::{ApiError, AuthError, OtpOutcome};
use food_client_core::{Email, Role};
use secrecy::SecretString;

/// Sign in and persist the session.
#[allow(clippy::print_stdout)]
pub async fn login(client: &FoodClient, email: Email, password: String) -> Result<(), AuthError> {
    let credentials = Credentials {
        email,
        password: SecretString::from(password),
    };
    let session = client.auth().login(&credentials).await?;
    println!("Signed in as {}", session.user.display_name);
    Ok(())
}

/// Register a new account.
#[allow(clippy::print_stdout)]
pub async fn signup(
    client: &FoodClient,
    name: String,
    email: Email,
    password: String,
    phone: Option<String>,
    role: Role,
) -> Result<(), AuthError> {
    let request = SignupRequest {
        name,
        email: email.clone(),
        password: SecretString::from(password),
        phone,
        role,
    };
    let message = client.auth().signup(&request).await?;
    println!("{message}");
    println!("Then run: food verify-otp -e {email} -o <code>");
    Ok(())
}

#[allow(clippy::print_stdout)]
pub async fn verify_otp(client: &FoodClient, email: &Email, otp: &str) -> Result<(), AuthError> {
    match client.auth().verify_otp(email, otp).await? {
        OtpOutcome::Verified { message } => {
            println!("{message}");
            println!("You can now sign in with: food login -e {email}");
        }
        OtpOutcome::SignedIn(session) => {
            println!("Verified and signed in as {}", session.user.display_name);
        }
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
pub async fn logout(client: &FoodClient) {
    if client.session().is_authenticated().await {
        client.auth().logout().await;
        println!("Signed out");
    } else {
        println!("Not signed in");
    }
}

/// Show the stored user, refreshed from the backend when possible.
#[allow(clippy::print_stdout)]
pub async fn whoami(client: &FoodClient) -> Result<(), AuthError> {
    let Some(stored) = client.session().current_user().await else {
        println!("Not signed in");
        return Ok(());
    };

    let profile = match client.auth().fetch_profile().await {
        Ok(profile) => profile,
        Err(AuthError::NotAuthenticated | AuthError::Api(ApiError::AuthExpired)) => {
            println!("Session expired, please sign in again");
            return Ok(());
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not refresh profile, showing stored copy");
            stored
        }
    };
    print_profile(&profile);
    Ok(())
}

pub async fn profile(
    client: &FoodClient,
    name: Option<String>,
    email: Option<Email>,
    phone: Option<String>,
) -> Result<(), AuthError> {
    let update = ProfileUpdate {
        display_name: name,
        email,
        phone,
    };
    let profile = client.auth().save_profile(&update).await?;
    print_profile(&profile);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_profile(profile: &UserProfile) {
    println!("{} (#{})", profile.display_name, profile.id);
    if let Some(email) = &profile.email {
        println!("  email: {email}");
    }
    if let Some(phone) = &profile.phone {
        println!("  phone: {phone}");
    }
    let roles: Vec<_> = profile.roles.iter().map(|r| r.as_str()).collect();
    if !roles.is_empty() {
        println!("  roles: {}", roles.join(", "));
    }
}
