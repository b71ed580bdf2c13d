use dryproof::run;

fn main() {
    let result = run();
    let error = match result {
        Err(error) => error,
        Ok(0) => return,
        Ok(code) => std::process::exit(code),
    };

    // Provide better error messages for cases where we can provide suggestions to the user.
    if let Some(dryproof::ConfError::PathNotFound(path)) = error.downcast_ref() {
        eprintln!("Configuration file not found at '{}'", path);
        eprintln!("Specify the file with scenarios to verify using '--config <FILE>'");
        std::process::exit(1);
    }

    // Print the error in detailed format for all other cases.
    eprintln!("{:?}", error);
    std::process::exit(1);
}
