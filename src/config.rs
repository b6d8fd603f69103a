/// The resolved set of object images to load, in the order they were given
/// on the command line. `main` builds this from `clap`'s matches; `with` is
/// a dependency-free equivalent kept around for unit testing.
#[derive(Debug, PartialEq)]
pub struct Config {
    pub paths: Vec<String>,
}

impl Config {
    /// Parses `args[1..]` (skipping the program name, as `std::env::args`
    /// includes it) as a list of object image paths.
    pub fn with(args: &[String]) -> Result<Self, &'static str> {
        if args.len() < 2 {
            return Err("not enough arguments");
        }

        Ok(Self {
            paths: args[1..].to_vec(),
        })
    }
}
