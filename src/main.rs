fn main() {
    let code = rad_loader::cli::run();
    std::process::exit(code);
}
