/// Build script for the user microservice.
///
/// Compiles the protocol buffer definitions for the served user service
/// and for the remote auth service this service calls into.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_build::compile_protos("proto/user.proto")?;
    tonic_build::compile_protos("proto/auth.proto")?;
    Ok(())
}
