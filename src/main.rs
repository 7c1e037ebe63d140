fn main() -> gtk::glib::ExitCode {
    util::logging::init();
    alphasurf::app::run()
}
