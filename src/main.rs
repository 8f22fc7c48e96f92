fn main() -> std::process::ExitCode {
  finboard_lib::run()
}
